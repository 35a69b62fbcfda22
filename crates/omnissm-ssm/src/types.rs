//! Fleet-management payload types.
//!
//! These structs are both the client request bodies and the bodies of
//! deferred-action messages, so their serde names are part of the queue
//! format.

use serde::{Deserialize, Serialize};

/// One-shot activation credentials minted for a registering instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Activation {
    pub activation_id: String,
    pub activation_code: String,
}

/// Request to mint an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivationRequest {
    /// Instance name the agent will register under
    pub default_instance_name: String,
    /// IAM role recorded on the activation
    pub iam_role: String,
    #[serde(default)]
    pub description: String,
}

impl ActivationRequest {
    pub fn new(name: &str, instance_role: &str) -> Self {
        ActivationRequest {
            default_instance_name: name.to_string(),
            iam_role: instance_role.to_string(),
            description: name.to_string(),
        }
    }
}

/// A single resource tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Tags to mirror onto a managed instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTags {
    /// Managed-instance id the tags apply to
    #[serde(rename = "Id")]
    pub resource_id: String,
    #[serde(rename = "Tags")]
    pub tags: Vec<Tag>,
}

/// Custom inventory record pushed for a managed instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomInventory {
    pub managed_id: String,
    pub type_name: String,
    pub schema_version: String,
    /// Formatted `2006-01-02T15:04:05Z`
    pub capture_time: String,
    pub content: InventoryContent,
}

/// The inventory content record. Key names are fixed by the downstream
/// schema (`Custom:CloudInfo` 1.0).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventoryContent {
    pub region: String,
    pub account_id: String,
    pub created: String,
    pub instance_id: String,
    pub instance_type: String,
    pub instance_role: String,
    #[serde(rename = "VPCId")]
    pub vpc_id: String,
    pub image_id: String,
    pub key_name: String,
    pub subnet_id: String,
    pub platform: String,
    pub state: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_wire_names() {
        let tags = ResourceTags {
            resource_id: "mi-1234".to_string(),
            tags: vec![Tag {
                key: "App".to_string(),
                value: "x".to_string(),
            }],
        };
        let value = serde_json::to_value(&tags).unwrap();
        assert_eq!(value["Id"], "mi-1234");
        assert_eq!(value["Tags"][0]["Key"], "App");
        assert_eq!(value["Tags"][0]["Value"], "x");
    }

    #[test]
    fn test_inventory_content_key_names() {
        let value = serde_json::to_value(InventoryContent::default()).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        for expected in [
            "Region",
            "AccountId",
            "Created",
            "InstanceId",
            "InstanceType",
            "InstanceRole",
            "VPCId",
            "ImageId",
            "KeyName",
            "SubnetId",
            "Platform",
            "State",
        ] {
            assert!(keys.contains(&expected), "missing key {expected}");
        }
        assert_eq!(keys.len(), 12);
    }

    #[test]
    fn test_activation_roundtrip() {
        let activation = Activation {
            activation_id: "a-1".to_string(),
            activation_code: "code".to_string(),
        };
        let json = serde_json::to_string(&activation).unwrap();
        assert!(json.contains("\"ActivationId\""));
        let back: Activation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, activation);
    }
}
