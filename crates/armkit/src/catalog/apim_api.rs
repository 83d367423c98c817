//! API Management API (`Microsoft.ApiManagement/service/apis`)

use declarative::{ArgKind, ArgSpec, Modifiers, ModuleDefinition, OutputField, Result, Rule, RuleSet};

pub fn module() -> Result<ModuleDefinition> {
    let rules = RuleSet::new(vec![
        Rule::camelize_keys(""),
        Rule::resource_id(
            "apiVersionSetId",
            "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.ApiManagement/service/{service_name}/apiVersionSets/{name}",
        ),
    ])?;

    Ok(ModuleDefinition::new(
        "apim_api",
        "API Management API",
        "2022-08-01",
        "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.ApiManagement/service/{service_name}/apis/{api_id}",
    )
    .arguments(vec![
        ArgSpec::string("display_name"),
        ArgSpec::string("description"),
        ArgSpec::string("path"),
        ArgSpec::list("protocols", ArgKind::String).choices(&["http", "https", "ws", "wss"]),
        ArgSpec::string("service_url"),
        ArgSpec::bool("subscription_required"),
        ArgSpec::string("api_revision"),
        ArgSpec::string("api_revision_description"),
        ArgSpec::string("api_version"),
        ArgSpec::new("api_version_set_id", ArgKind::Raw),
        ArgSpec::string("api_type").choices(&["http", "soap", "websocket", "graphql"]),
        ArgSpec::dict(
            "subscription_key_parameter_names",
            vec![ArgSpec::string("header"), ArgSpec::string("query")],
        ),
    ])
    .rules(rules)
    .modifiers(
        Modifiers::new()
            .case_insensitive("/serviceUrl")
            .case_insensitive("/apiVersionSetId"),
    )
    .outputs(vec![OutputField::new("/isCurrent"), OutputField::new("/apiRevision")])
    .read_only(&["/id", "/name", "/type", "/etag", "/provisioningState", "/isCurrent", "/isOnline"]))
}
