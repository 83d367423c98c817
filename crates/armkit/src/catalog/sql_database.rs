//! Azure SQL database (`Microsoft.Sql/servers/databases`)

use declarative::{ArgKind, ArgSpec, Modifiers, ModuleDefinition, OutputField, Result, Rule, RuleSet};

const CREATE_MODES: &[&str] = &[
    "default",
    "copy",
    "secondary",
    "point_in_time_restore",
    "recovery",
    "restore",
    "restore_long_term_retention_backup",
];

pub fn module() -> Result<ModuleDefinition> {
    let rules = RuleSet::new(vec![
        Rule::rename("max_size_bytes", "maxSizeBytes"),
        Rule::rename("zone_redundant", "zoneRedundant"),
        Rule::rename("create_mode", "createMode"),
        Rule::camelize("createMode"),
        Rule::rename("source_database_id", "sourceDatabaseId"),
        Rule::resource_id(
            "sourceDatabaseId",
            "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Sql/servers/{server_name}/databases/{name}",
        ),
        Rule::rename("elastic_pool_name", "elasticPoolId"),
        Rule::resource_id(
            "elasticPoolId",
            "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Sql/servers/{server_name}/elasticPools/{name}",
        ),
        Rule::rename("read_scale", "readScale"),
        Rule::bool_map("readScale", "Enabled", "Disabled"),
    ])?;

    // createMode and sourceDatabaseId are write-only; the API never echoes them
    let modifiers = Modifiers::new()
        .immutable("/collation")
        .ignore("/createMode")
        .ignore("/sourceDatabaseId")
        .case_insensitive("/elasticPoolId")
        .case_insensitive("/sku/name");

    Ok(ModuleDefinition::new(
        "sql_database",
        "SQL Database",
        "2021-11-01",
        "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Sql/servers/{server_name}/databases/{name}",
    )
    .arguments(vec![
        ArgSpec::string("location"),
        ArgSpec::string("collation"),
        ArgSpec::string("create_mode").choices(CREATE_MODES),
        ArgSpec::new("source_database_id", ArgKind::Raw),
        ArgSpec::new("elastic_pool_name", ArgKind::Raw),
        ArgSpec::dict(
            "sku",
            vec![
                ArgSpec::string("name").required(),
                ArgSpec::string("tier"),
                ArgSpec::int("capacity"),
            ],
        ),
        ArgSpec::int("max_size_bytes"),
        ArgSpec::bool("read_scale"),
        ArgSpec::bool("zone_redundant"),
        ArgSpec::new("tags", ArgKind::Dict),
    ])
    .rules(rules)
    .modifiers(modifiers)
    .outputs(vec![
        OutputField::new("/status"),
        OutputField::new("/databaseId"),
        OutputField::named("service_objective", "/currentServiceObjectiveName"),
    ])
    .read_only(&[
        "/id",
        "/name",
        "/type",
        "/etag",
        "/provisioningState",
        "/status",
        "/databaseId",
        "/creationDate",
        "/currentServiceObjectiveName",
        "/currentSku",
    ]))
}
