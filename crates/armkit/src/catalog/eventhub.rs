//! Event Hub (`Microsoft.EventHub/namespaces/eventhubs`)

use declarative::{ArgKind, ArgSpec, Modifiers, ModuleDefinition, OutputField, Result, Rule, RuleSet};

const STATUS: &[&str] = &[
    "active",
    "disabled",
    "restoring",
    "send_disabled",
    "receive_disabled",
    "creating",
    "deleting",
    "renaming",
    "unknown",
];

pub fn module() -> Result<ModuleDefinition> {
    let rules = RuleSet::new(vec![
        Rule::camelize_keys(""),
        Rule::camelize("status"),
        Rule::camelize("captureDescription/encoding"),
        Rule::resource_id(
            "captureDescription/destination/storageAccountResourceId",
            "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Storage/storageAccounts/{name}",
        ),
        Rule::camelize("retentionDescription/cleanupPolicy"),
    ])?;

    Ok(ModuleDefinition::new(
        "eventhub",
        "Event Hub",
        "2024-01-01",
        "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.EventHub/namespaces/{namespace_name}/eventhubs/{name}",
    )
    .arguments(vec![
        ArgSpec::int("message_retention_in_days"),
        ArgSpec::int("partition_count"),
        ArgSpec::string("status").choices(STATUS),
        ArgSpec::dict(
            "capture_description",
            vec![
                ArgSpec::bool("enabled"),
                ArgSpec::string("encoding").choices(&["avro", "avro_deflate"]),
                ArgSpec::int("interval_in_seconds"),
                ArgSpec::int("size_limit_in_bytes"),
                ArgSpec::bool("skip_empty_archives"),
                ArgSpec::dict(
                    "destination",
                    vec![
                        ArgSpec::string("name"),
                        ArgSpec::new("storage_account_resource_id", ArgKind::Raw),
                        ArgSpec::string("blob_container"),
                        ArgSpec::string("archive_name_format"),
                    ],
                ),
            ],
        ),
        ArgSpec::dict(
            "retention_description",
            vec![
                ArgSpec::string("cleanup_policy").choices(&["delete", "compact"]),
                ArgSpec::int("retention_time_in_hours"),
                ArgSpec::int("tombstone_retention_time_in_hours"),
            ],
        ),
    ])
    .rules(rules)
    .modifiers(Modifiers::new().case_insensitive("/captureDescription/destination/storageAccountResourceId"))
    .outputs(vec![
        OutputField::new("/status"),
        OutputField::new("/partitionIds"),
        OutputField::new("/createdAt"),
    ])
    .read_only(&[
        "/id",
        "/name",
        "/type",
        "/etag",
        "/provisioningState",
        "/partitionIds",
        "/createdAt",
        "/updatedAt",
    ]))
}
