//! Metric alert rule (`Microsoft.Insights/metricAlerts`)

use declarative::{ArgKind, ArgSpec, Modifiers, ModuleDefinition, OutputField, Result, Rule, RuleSet};

pub fn module() -> Result<ModuleDefinition> {
    let rules = RuleSet::new(vec![
        Rule::rename("evaluation_frequency", "evaluationFrequency"),
        Rule::uppercase("evaluationFrequency"),
        Rule::rename("window_size", "windowSize"),
        Rule::uppercase("windowSize"),
        Rule::rename("auto_mitigate", "autoMitigate"),
        Rule::camelize_keys("criteria"),
        Rule::enum_map(
            "criteria/odataType",
            &[
                (
                    "single_resource_multiple_metric_criteria",
                    "Microsoft.Azure.Monitor.SingleResourceMultipleMetricCriteria",
                ),
                (
                    "multiple_resource_multiple_metric_criteria",
                    "Microsoft.Azure.Monitor.MultipleResourceMultipleMetricCriteria",
                ),
            ],
        ),
        Rule::rename("criteria/odataType", "odata.type"),
        Rule::camelize("criteria/allOf/*/operator"),
        Rule::camelize("criteria/allOf/*/timeAggregation"),
        Rule::camelize("criteria/allOf/*/criterionType"),
        Rule::camelize_keys("actions"),
        Rule::resource_id(
            "actions/*/actionGroupId",
            "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Insights/actionGroups/{name}",
        ),
    ])?;

    // The API lowercases parts of resource ids it echoes back
    let modifiers = Modifiers::new()
        .case_insensitive("/scopes/*")
        .case_insensitive("/actions/*/actionGroupId")
        .case_insensitive("/criteria/allOf/*/metricName");

    Ok(ModuleDefinition::new(
        "metric_alert",
        "Metric Alert",
        "2018-03-01",
        "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/Microsoft.Insights/metricAlerts/{name}",
    )
    .arguments(vec![
        ArgSpec::string("location"),
        ArgSpec::string("description"),
        ArgSpec::int("severity"),
        ArgSpec::bool("enabled"),
        ArgSpec::list("scopes", ArgKind::String),
        ArgSpec::string("evaluation_frequency"),
        ArgSpec::string("window_size"),
        ArgSpec::bool("auto_mitigate"),
        ArgSpec::dict(
            "criteria",
            vec![
                ArgSpec::string("odata_type")
                    .required()
                    .choices(&["single_resource_multiple_metric_criteria", "multiple_resource_multiple_metric_criteria"]),
                ArgSpec::list_of(
                    "all_of",
                    vec![
                        ArgSpec::string("name").required(),
                        ArgSpec::string("metric_name").required(),
                        ArgSpec::string("metric_namespace"),
                        ArgSpec::string("operator").choices(&[
                            "equals",
                            "greater_than",
                            "greater_than_or_equal",
                            "less_than",
                            "less_than_or_equal",
                        ]),
                        ArgSpec::new("threshold", ArgKind::Float),
                        ArgSpec::string("time_aggregation")
                            .choices(&["average", "count", "minimum", "maximum", "total"]),
                        ArgSpec::string("criterion_type").choices(&["static_threshold_criterion"]),
                    ],
                ),
            ],
        ),
        ArgSpec::list_of("actions", vec![ArgSpec::new("action_group_id", ArgKind::Raw).required()]),
        ArgSpec::new("tags", ArgKind::Dict),
    ])
    .rules(rules)
    .modifiers(modifiers)
    .outputs(vec![OutputField::new("/lastUpdatedTime")])
    .read_only(&["/id", "/name", "/type", "/etag", "/provisioningState", "/lastUpdatedTime"]))
}
