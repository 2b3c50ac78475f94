use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Relationship multiplicity tags as they appear in generated schema exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipKind {
    #[serde(rename = "1:N")]
    OneToMany,
    #[serde(rename = "N:1")]
    ManyToOne,
    #[serde(rename = "N:N")]
    ManyToMany,
    #[serde(rename = "SELF")]
    SelfReferential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    #[serde(rename = "LookupAttribute")]
    Lookup,
    #[serde(rename = "StringAttribute")]
    String,
    #[serde(rename = "IntegerAttribute")]
    Integer,
    #[serde(rename = "DecimalAttribute")]
    Decimal,
    #[serde(rename = "BooleanAttribute")]
    Boolean,
    #[serde(rename = "DateTimeAttribute")]
    DateTime,
    #[serde(rename = "ChoiceAttribute")]
    Choice,
    #[serde(rename = "StatusAttribute")]
    Status,
    #[serde(rename = "FileAttribute")]
    File,
    #[serde(other)]
    Generic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attribute {
    pub schema_name: String,
    #[serde(default)]
    pub display_name: String,
    pub attribute_type: AttributeKind,
    #[serde(default)]
    pub is_primary_id: bool,
    #[serde(default)]
    pub is_custom_attribute: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Relationship {
    pub schema_name: String,
    pub source_entity_schema_name: String,
    pub target_entity_schema_name: String,
    pub relationship_type: RelationshipKind,
}

/// A schema table projected for diagram purposes. `visible_attributes` is the
/// subset of attribute schema names currently shown on the diagram box; every
/// member must name an attribute in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Entity {
    pub schema_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(rename = "visibleAttributeSchemaNames", default)]
    pub visible_attributes: BTreeSet<String>,
}

impl Entity {
    pub fn new(schema_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            display_name: display_name.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            visible_attributes: BTreeSet::new(),
        }
    }

    pub fn has_attribute(&self, schema_name: &str) -> bool {
        self.attributes.iter().any(|a| a.schema_name == schema_name)
    }

    pub fn attribute(&self, schema_name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.schema_name == schema_name)
    }

    /// Default visible set: the primary-id attribute (if any) plus every
    /// custom lookup attribute.
    pub fn default_visible_attributes(&self) -> BTreeSet<String> {
        let mut visible = BTreeSet::new();
        if let Some(primary) = self.attributes.iter().find(|a| a.is_primary_id) {
            visible.insert(primary.schema_name.clone());
        }
        for attr in &self.attributes {
            if attr.attribute_type == AttributeKind::Lookup && attr.is_custom_attribute {
                visible.insert(attr.schema_name.clone());
            }
        }
        visible
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str, custom: bool) -> Attribute {
        Attribute {
            schema_name: name.to_string(),
            display_name: name.to_string(),
            attribute_type: AttributeKind::Lookup,
            is_primary_id: false,
            is_custom_attribute: custom,
        }
    }

    #[test]
    fn default_visible_set_is_primary_plus_custom_lookups() {
        let mut entity = Entity::new("account", "Account");
        entity.attributes.push(Attribute {
            schema_name: "accountid".to_string(),
            display_name: "Account".to_string(),
            attribute_type: AttributeKind::String,
            is_primary_id: true,
            is_custom_attribute: false,
        });
        entity.attributes.push(lookup("new_ownerid", true));
        entity.attributes.push(lookup("new_regionid", true));
        entity.attributes.push(lookup("parentaccountid", false));

        let visible = entity.default_visible_attributes();
        assert_eq!(visible.len(), 3);
        assert!(visible.contains("accountid"));
        assert!(visible.contains("new_ownerid"));
        assert!(visible.contains("new_regionid"));
        assert!(!visible.contains("parentaccountid"));
    }

    #[test]
    fn attribute_kind_round_trips_known_and_unknown_tags() {
        let json = "\"LookupAttribute\"";
        let kind: AttributeKind = serde_json::from_str(json).unwrap();
        assert_eq!(kind, AttributeKind::Lookup);

        let kind: AttributeKind = serde_json::from_str("\"HologramAttribute\"").unwrap();
        assert_eq!(kind, AttributeKind::Generic);
    }
}
