//! Service Bus queue (`Microsoft.ServiceBus/namespaces/queues`)

use declarative::{ArgSpec, Modifiers, ModuleDefinition, OutputField, Result, Rule, RuleSet};

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
        Rule::rename("max_size_in_mb", "maxSizeInMegabytes"),
        Rule::camelize_keys(""),
        Rule::camelize("status"),
    ])?;

    // Queue properties that are fixed at creation time
    let modifiers = Modifiers::new()
        .immutable("/requiresSession")
        .immutable("/requiresDuplicateDetection")
        .immutable("/enablePartitioning")
        .case_insensitive("/forwardTo")
        .case_insensitive("/forwardDeadLetteredMessagesTo");

    Ok(ModuleDefinition::new(
        "servicebus_queue",
        "Service Bus Queue",
        "2021-11-01",
        "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.ServiceBus/namespaces/{namespace_name}/queues/{name}",
    )
    .arguments(vec![
        ArgSpec::int("max_size_in_mb"),
        ArgSpec::int("max_delivery_count"),
        ArgSpec::bool("requires_session"),
        ArgSpec::bool("requires_duplicate_detection"),
        ArgSpec::bool("dead_lettering_on_message_expiration"),
        ArgSpec::bool("enable_batched_operations"),
        ArgSpec::bool("enable_express"),
        ArgSpec::bool("enable_partitioning"),
        ArgSpec::string("forward_to"),
        ArgSpec::string("forward_dead_lettered_messages_to"),
        ArgSpec::string("status").choices(STATUS),
    ])
    .rules(rules)
    .modifiers(modifiers)
    .outputs(vec![
        OutputField::new("/status"),
        OutputField::new("/messageCount"),
        OutputField::new("/sizeInBytes"),
    ])
    .read_only(&[
        "/id",
        "/name",
        "/type",
        "/etag",
        "/provisioningState",
        "/messageCount",
        "/sizeInBytes",
        "/countDetails",
        "/createdAt",
        "/updatedAt",
        "/accessedAt",
    ]))
}
