//! Configuration-change event model.
//!
//! Inbound envelope from the configuration-history stream. Field names
//! follow the wire format; only the fields the processor consumes are
//! modeled, everything else is ignored on decode.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Event source tag for the configuration service.
pub const CONFIG_EVENT_SOURCE: &str = "aws.config";

/// Resource type handled by the change processor.
pub const INSTANCE_RESOURCE_TYPE: &str = "AWS::EC2::Instance";

pub const CONFIGURATION_ITEM_CHANGE: &str = "ConfigurationItemChangeNotification";
pub const OVERSIZED_CONFIGURATION_ITEM_CHANGE: &str =
    "OversizedConfigurationItemChangeNotification";

/// Statuses that lead to a mutation; everything else is dropped.
pub const HANDLED_STATUSES: [&str; 3] = ["ResourceDiscovered", "OK", "ResourceDeleted"];

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigurationEvent {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub region: String,
    pub detail: EventDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    #[serde(default)]
    pub message_type: String,
    pub configuration_item: Option<ConfigurationItem>,
    pub configuration_item_summary: Option<ConfigurationItemSummary>,
    pub s3_delivery_summary: Option<S3DeliverySummary>,
}

impl ConfigurationEvent {
    /// Resource type, from the inline item or the oversized summary.
    pub fn resource_type(&self) -> &str {
        if let Some(item) = &self.detail.configuration_item {
            return &item.resource_type;
        }
        if let Some(summary) = &self.detail.configuration_item_summary {
            return &summary.resource_type;
        }
        ""
    }

    /// Item status, from the inline item or the oversized summary.
    pub fn status(&self) -> &str {
        if let Some(item) = &self.detail.configuration_item {
            return &item.configuration_item_status;
        }
        if let Some(summary) = &self.detail.configuration_item_summary {
            return &summary.configuration_item_status;
        }
        ""
    }
}

/// Point-in-time record of an instance's attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigurationItem {
    pub resource_type: String,
    pub resource_id: String,
    pub configuration_item_status: String,
    pub configuration_item_capture_time: String,
    pub resource_creation_time: String,
    pub aws_account_id: String,
    pub aws_region: String,
    #[serde(rename = "ARN")]
    pub arn: String,
    pub availability_zone: String,
    pub configuration: Configuration,
    pub tags: HashMap<String, String>,
}

impl ConfigurationItem {
    /// Registration name of the instance this item describes.
    pub fn name(&self) -> String {
        format!("{}-{}", self.aws_account_id, self.resource_id)
    }
}

/// Truncated item carried by oversized notifications.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigurationItemSummary {
    pub resource_type: String,
    pub resource_id: String,
    pub configuration_item_status: String,
    pub aws_account_id: String,
    pub aws_region: String,
}

/// Pointer to the object-store location holding the full item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct S3DeliverySummary {
    pub s3_bucket_location: String,
}

/// The `configuration` sub-record of an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    pub image_id: String,
    pub key_name: String,
    pub platform: String,
    pub subnet_id: String,
    pub instance_type: String,
    pub vpc_id: String,
    pub iam_instance_profile: IamInstanceProfile,
    pub state: InstanceState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IamInstanceProfile {
    pub arn: String,
    pub id: String,
}

/// Instance state name.
///
/// The upstream feed emits this field as `null`, a scalar string, or a
/// `{code, name}` object depending on record version; all three decode
/// to the scalar name (`null` becomes the empty string).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceState(pub String);

impl<'de> Deserialize<'de> for InstanceState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Object { name: String },
            Scalar(String),
            Null,
        }

        match Raw::deserialize(deserializer)? {
            Raw::Object { name } => Ok(InstanceState(name)),
            Raw::Scalar(name) => Ok(InstanceState(name)),
            Raw::Null => Ok(InstanceState(String::new())),
        }
    }
}
