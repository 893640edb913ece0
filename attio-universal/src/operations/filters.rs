use super::{FilterCondition, FilterOperator};
use crate::error::{Result, UniversalError};
use crate::metadata::{MetadataFetchResult, MetadataOptions, MetadataResolver};
use crate::resource::ResourceType;
use serde_json::Value;

/// Check search filters against attribute metadata before the remote call
///
/// Only `equals` conditions on select and status attributes are checked,
/// against the attribute's non-archived options. Other operators match on
/// partial text and are passed through unchecked. Metadata is only fetched
/// when there is an `equals` condition to check.
pub async fn validate_filters(
    resolver: &MetadataResolver,
    resource_type: ResourceType,
    object: Option<&str>,
    filters: &[FilterCondition],
) -> Result<()> {
    if !filters
        .iter()
        .any(|condition| condition.operator == FilterOperator::Equals)
    {
        return Ok(());
    }

    let options = MetadataOptions {
        object: object.map(str::to_string),
        record_data: None,
    };
    let metadata = resolver.fetch_metadata(resource_type, &options).await?;

    filters
        .iter()
        .try_for_each(|condition| validate_condition(&metadata, condition))
}

/// Check one condition; unknown attributes and missing metadata pass
pub fn validate_condition(metadata: &MetadataFetchResult, condition: &FilterCondition) -> Result<()> {
    if condition.operator != FilterOperator::Equals {
        return Ok(());
    }

    let Some(attribute) = metadata.find(&condition.attribute) else {
        return Ok(());
    };
    if !attribute.attribute_type.is_select_like() {
        return Ok(());
    }

    let active: Vec<_> = attribute.active_options().collect();
    if active.is_empty() {
        return Ok(());
    }

    let values: Vec<&str> = match &condition.value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    match values
        .into_iter()
        .find(|value| !active.iter().any(|option| option.matches(value)))
    {
        Some(invalid) => Err(UniversalError::FilterValidation {
            attribute: attribute.slug.clone(),
            value: invalid.to_string(),
            valid_options: active.iter().map(|option| option.title.clone()).collect(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixture_resolver;

    async fn deal_metadata() -> MetadataFetchResult {
        fixture_resolver()
            .fetch_metadata(ResourceType::Deals, &MetadataOptions::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_equals_on_status_is_validated() {
        let metadata = deal_metadata().await;

        assert!(validate_condition(&metadata, &FilterCondition::equals("stage", "Lead")).is_ok());
        assert!(validate_condition(&metadata, &FilterCondition::equals("stage", "won")).is_ok());

        let err = validate_condition(&metadata, &FilterCondition::equals("stage", "Hot")).unwrap_err();
        match err {
            UniversalError::FilterValidation {
                attribute,
                value,
                valid_options,
            } => {
                assert_eq!(attribute, "stage");
                assert_eq!(value, "Hot");
                assert_eq!(valid_options, vec!["Lead", "In Progress", "Won"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_archived_option_is_rejected() {
        let metadata = deal_metadata().await;
        let err = validate_condition(&metadata, &FilterCondition::equals("stage", "Lost")).unwrap_err();
        assert!(err.to_string().contains("Valid options are: Lead, In Progress, Won"));
    }

    #[tokio::test]
    async fn test_other_operators_skip_validation() {
        let metadata = deal_metadata().await;
        for operator in [
            FilterOperator::Contains,
            FilterOperator::StartsWith,
            FilterOperator::NotEquals,
        ] {
            let condition = FilterCondition::new("stage", operator, "Hot");
            assert!(validate_condition(&metadata, &condition).is_ok());
        }
    }

    #[tokio::test]
    async fn test_unknown_attribute_and_non_select_pass() {
        let metadata = deal_metadata().await;
        assert!(validate_condition(&metadata, &FilterCondition::equals("mystery", "x")).is_ok());
        assert!(validate_condition(&metadata, &FilterCondition::equals("name", "x")).is_ok());
        assert!(
            validate_condition(&MetadataFetchResult::empty(), &FilterCondition::equals("stage", "Hot"))
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_validate_filters_checks_every_condition() {
        let resolver = fixture_resolver();
        let filters = vec![
            FilterCondition::new("name", FilterOperator::Contains, "Big"),
            FilterCondition::equals("stage", vec!["Lead", "Hot"]),
        ];

        let err = validate_filters(&resolver, ResourceType::Deals, None, &filters)
            .await
            .unwrap_err();
        assert!(matches!(err, UniversalError::FilterValidation { .. }));

        assert!(validate_filters(&resolver, ResourceType::Deals, None, &filters[..1])
            .await
            .is_ok());
    }
}
