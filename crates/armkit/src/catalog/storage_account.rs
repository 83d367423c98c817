//! Storage account (`Microsoft.Storage/storageAccounts`)
//!
//! Updated with PATCH, like the SDK's `update` operation.

use declarative::{
    ArgKind, ArgSpec, Modifiers, ModuleDefinition, OutputField, Result, Rule, RuleSet, UpdateStyle,
};

const SKUS: &[&str] = &[
    "Standard_LRS",
    "Standard_GRS",
    "Standard_RAGRS",
    "Standard_ZRS",
    "Standard_GZRS",
    "Standard_RAGZRS",
    "Premium_LRS",
    "Premium_ZRS",
];

pub fn module() -> Result<ModuleDefinition> {
    let rules = RuleSet::new(vec![
        Rule::rename("account_type", "name"),
        Rule::expand_into("name", "sku"),
        Rule::rename("https_only", "supportsHttpsTrafficOnly"),
        Rule::rename("access_tier", "accessTier"),
        Rule::camelize("accessTier"),
        Rule::rename("minimum_tls_version", "minimumTlsVersion"),
        Rule::uppercase("minimumTlsVersion"),
        Rule::rename("allow_blob_public_access", "allowBlobPublicAccess"),
        Rule::rename("network_acls", "networkAcls"),
        Rule::camelize_keys("networkAcls"),
        Rule::enum_map(
            "networkAcls/bypass",
            &[
                ("none", "None"),
                ("azure_services", "AzureServices"),
                ("logging", "Logging"),
                ("metrics", "Metrics"),
            ],
        ),
        Rule::camelize("networkAcls/defaultAction"),
        Rule::camelize("networkAcls/ipRules/*/action"),
    ])?;

    let modifiers = Modifiers::new()
        .immutable("/location")
        .case_insensitive("/sku/name")
        .case_insensitive("/accessTier");

    Ok(ModuleDefinition::new(
        "storage_account",
        "Storage Account",
        "2023-01-01",
        "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Storage/storageAccounts/{name}",
    )
    .arguments(vec![
        ArgSpec::string("location"),
        ArgSpec::string("account_type").choices(SKUS),
        ArgSpec::string("kind").choices(&["Storage", "StorageV2", "BlobStorage", "FileStorage", "BlockBlobStorage"]),
        ArgSpec::string("access_tier").choices(&["hot", "cool", "premium"]),
        ArgSpec::bool("https_only"),
        ArgSpec::string("minimum_tls_version").choices(&["tls1_0", "tls1_1", "tls1_2"]),
        ArgSpec::bool("allow_blob_public_access"),
        ArgSpec::new("tags", ArgKind::Dict),
        ArgSpec::dict(
            "network_acls",
            vec![
                ArgSpec::string("bypass").choices(&["none", "azure_services", "logging", "metrics"]),
                ArgSpec::string("default_action").choices(&["allow", "deny"]),
                ArgSpec::list_of(
                    "ip_rules",
                    vec![
                        ArgSpec::string("value").required(),
                        ArgSpec::string("action").choices(&["allow"]),
                    ],
                ),
            ],
        ),
    ])
    .rules(rules)
    .modifiers(modifiers)
    .update_style(UpdateStyle::Patch)
    .outputs(vec![
        OutputField::new("/provisioningState"),
        OutputField::new("/primaryEndpoints"),
        OutputField::new("/statusOfPrimary"),
    ]))
}
