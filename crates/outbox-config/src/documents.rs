// crates/outbox-config/src/documents.rs
// ============================================================================
// Module: Policy Documents
// Description: Typed records and strict parsers for the policy/reference YAML files.
// Purpose: Reject shape deviations at load time so no untyped maps leave the loader.
// Dependencies: serde, serde_yaml, thiserror
// ============================================================================

//! ## Overview
//! Every contract document is a YAML mapping carrying a `schema_version`
//! string. Each document deserializes into a private raw form and then runs a
//! `validate` pass that builds the public record, failing with a
//! document-scoped [`ConfigError`] on the first shape deviation. Unknown
//! top-level keys are tolerated; missing or malformed known keys are not.
//!
//! ## Invariants
//! - List-valued fields hold trimmed, non-empty strings, de-duplicated in
//!   first-occurrence order.
//! - Type-keyed maps are `canonical type -> list of strings`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::de;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Contract loading and lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A document could not be read from disk.
    #[error("config io error: {path}: {message}")]
    Io {
        /// Source document path.
        path: String,
        /// Underlying I/O failure.
        message: String,
    },
    /// A document is not decodable YAML.
    #[error("config parse error: {path}: {message}")]
    Parse {
        /// Source document path.
        path: String,
        /// Decoder failure.
        message: String,
    },
    /// A document decoded but violates its expected shape.
    #[error("invalid config {path}: {message}")]
    Invalid {
        /// Source document path.
        path: String,
        /// Description of the shape violation.
        message: String,
    },
    /// The canonical type has no wit map entry.
    #[error("unknown canonical type '{0}' in wit map")]
    UnknownType(String),
    /// The canonical field key has no field map entry.
    #[error("unknown canonical field key '{0}' in field map")]
    UnknownField(String),
    /// The field mapping does not apply to the requested type.
    #[error("canonical field key '{field}' is not allowed for canonical type '{canonical_type}'")]
    FieldNotApplicable {
        /// Canonical field key.
        field: String,
        /// Canonical type the lookup was scoped to.
        canonical_type: String,
    },
}

// ============================================================================
// SECTION: Document Decoding
// ============================================================================

/// A policy document decoded into a raw serde form and then validated.
trait PolicyDocument: Sized {
    /// Serde form decoded straight from the YAML text.
    type Raw: DeserializeOwned;

    /// Checks the raw form and builds the typed record.
    fn validate(raw: Self::Raw) -> Result<Self, String>;
}

/// Reads and decodes a document from disk.
fn load_document<D: PolicyDocument>(path: &Path) -> Result<D, ConfigError> {
    let label = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|err| ConfigError::Io {
        path: label.clone(),
        message: err.to_string(),
    })?;
    parse_document(label, &text)
}

/// Decodes document text that was read from `path`.
///
/// Undecodable YAML is a [`ConfigError::Parse`]; a missing `schema_version`
/// header, a serde shape mismatch, or a failed validation is a
/// [`ConfigError::Invalid`] scoped to the document.
fn parse_document<D: PolicyDocument>(path: String, text: &str) -> Result<D, ConfigError> {
    let envelope: Value = serde_yaml::from_str(text).map_err(|err| ConfigError::Parse {
        path: path.clone(),
        message: err.to_string(),
    })?;
    let invalid = |message: String| ConfigError::Invalid {
        path: path.clone(),
        message,
    };
    let versioned = match &envelope {
        Value::Mapping(root) => root
            .get("schema_version")
            .and_then(Value::as_str)
            .is_some_and(|version| !version.trim().is_empty()),
        Value::Null => false,
        _ => return Err(invalid("document must decode to a mapping".to_string())),
    };
    if !versioned {
        return Err(invalid("missing or invalid schema_version".to_string()));
    }
    let raw: D::Raw = serde_yaml::from_str(text).map_err(|err| invalid(err.to_string()))?;
    D::validate(raw).map_err(invalid)
}

/// Trims a mapping key, rejecting blank keys.
fn trimmed_key(raw: &str, section: &str) -> Result<String, String> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(format!("{section} contains an invalid key"));
    }
    Ok(key.to_string())
}

/// Trims an optional scalar, treating blank text as absent.
fn trimmed(raw: Option<String>) -> Option<String> {
    raw.map(|text| text.trim().to_string()).filter(|text| !text.is_empty())
}

/// Deserializes a list of non-empty strings, de-duplicated in first-seen order.
fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = Vec::<String>::deserialize(deserializer)?;
    let mut seen = BTreeSet::new();
    let mut parsed = Vec::with_capacity(entries.len());
    for entry in entries {
        let text = entry.trim();
        if text.is_empty() {
            return Err(de::Error::custom("list must contain non-empty strings"));
        }
        if seen.insert(text.to_string()) {
            parsed.push(text.to_string());
        }
    }
    Ok(parsed)
}

/// Trimmed, non-empty, de-duplicated list of strings.
#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
struct StringList(#[serde(deserialize_with = "string_list")] Vec<String>);

/// Raw `canonical type -> list of strings` section.
type TypeLists = BTreeMap<String, StringList>;

/// Trims the type keys of an optional type-keyed section.
fn type_lists(
    raw: Option<TypeLists>,
    section: &str,
) -> Result<BTreeMap<String, Vec<String>>, String> {
    let mut parsed = BTreeMap::new();
    for (raw_type, StringList(values)) in raw.unwrap_or_default() {
        parsed.insert(trimmed_key(&raw_type, section)?, values);
    }
    Ok(parsed)
}

// ============================================================================
// SECTION: Wit Map
// ============================================================================

/// Canonical work-item type to remote work-item type mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WitMap {
    /// Canonical type name to remote type name.
    pub canonical_to_ado: BTreeMap<String, String>,
}

impl WitMap {
    /// Loads `wit_map.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the document is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_document(path)
    }

    /// Returns the remote type for a canonical type.
    #[must_use]
    pub fn get(&self, canonical_type: &str) -> Option<&str> {
        self.canonical_to_ado.get(canonical_type).map(String::as_str)
    }

    /// Returns true when the canonical type is mapped.
    #[must_use]
    pub fn contains(&self, canonical_type: &str) -> bool {
        self.canonical_to_ado.contains_key(canonical_type)
    }
}

/// Raw `wit_map.yaml`.
#[derive(Deserialize)]
struct RawWitMap {
    /// Canonical type to remote type.
    canonical_to_ado: Option<BTreeMap<String, Option<String>>>,
}

impl PolicyDocument for WitMap {
    type Raw = RawWitMap;

    fn validate(raw: RawWitMap) -> Result<Self, String> {
        let entries = raw.canonical_to_ado.ok_or("canonical_to_ado must be a mapping")?;
        let mut canonical_to_ado = BTreeMap::new();
        for (raw_type, raw_remote) in entries {
            let canonical_type = trimmed_key(&raw_type, "canonical_to_ado")?;
            let remote = trimmed(raw_remote)
                .ok_or_else(|| format!("invalid remote type value for '{canonical_type}'"))?;
            canonical_to_ado.insert(canonical_type, remote);
        }
        Ok(Self {
            canonical_to_ado,
        })
    }
}

// ============================================================================
// SECTION: Field Map
// ============================================================================

/// One canonical field key mapped to a remote field reference name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    /// Canonical field key.
    pub canonical_key: String,
    /// Remote field reference name.
    pub reference_name: String,
    /// Canonical types the mapping applies to; empty means all types.
    pub applies_to: Vec<String>,
    /// Optional operator-facing description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldMapping {
    /// Returns true when the mapping applies to the canonical type.
    #[must_use]
    pub fn applies_to_type(&self, canonical_type: &str) -> bool {
        self.applies_to.is_empty() || self.applies_to.iter().any(|entry| entry == canonical_type)
    }
}

/// Canonical field key to remote field mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldMap {
    /// Mappings keyed by canonical field key.
    pub canonical_to_ado: BTreeMap<String, FieldMapping>,
}

impl FieldMap {
    /// Loads `field_map.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the document is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_document(path)
    }

    /// Returns the mapping for a canonical field key.
    #[must_use]
    pub fn get(&self, canonical_key: &str) -> Option<&FieldMapping> {
        self.canonical_to_ado.get(canonical_key)
    }
}

/// Raw `field_map.yaml` entry.
#[derive(Deserialize)]
struct RawFieldMapping {
    /// Remote field reference name.
    reference_name: Option<String>,
    /// Canonical types the mapping applies to.
    applies_to: Option<StringList>,
    /// Operator-facing description.
    description: Option<String>,
}

/// Raw `field_map.yaml`.
#[derive(Deserialize)]
struct RawFieldMap {
    /// Canonical field key to mapping entry.
    canonical_to_ado: Option<BTreeMap<String, RawFieldMapping>>,
}

impl PolicyDocument for FieldMap {
    type Raw = RawFieldMap;

    fn validate(raw: RawFieldMap) -> Result<Self, String> {
        let entries = raw.canonical_to_ado.ok_or("canonical_to_ado must be a mapping")?;
        let mut canonical_to_ado = BTreeMap::new();
        for (raw_key, entry) in entries {
            let canonical_key = trimmed_key(&raw_key, "canonical_to_ado")?;
            let reference_name = trimmed(entry.reference_name).ok_or_else(|| {
                format!(
                    "field_map entry for '{canonical_key}' must include non-empty \
                     reference_name"
                )
            })?;
            canonical_to_ado.insert(
                canonical_key.clone(),
                FieldMapping {
                    canonical_key,
                    reference_name,
                    applies_to: entry.applies_to.unwrap_or_default().0,
                    description: trimmed(entry.description),
                },
            );
        }
        Ok(Self {
            canonical_to_ado,
        })
    }
}

// ============================================================================
// SECTION: Field Policy
// ============================================================================

/// How owner identities in bundles are matched against team rosters.
///
/// # Invariants
/// - Serialized names are stable: `display_name`, `unique_name`, `either`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerIdentityFormat {
    /// Match and emit display names.
    #[default]
    DisplayName,
    /// Match and emit unique (account) names.
    UniqueName,
    /// Match either form.
    Either,
}

impl OwnerIdentityFormat {
    /// Returns the serialized name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DisplayName => "display_name",
            Self::UniqueName => "unique_name",
            Self::Either => "either",
        }
    }

    /// Parses a case-insensitive format name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "display_name" => Some(Self::DisplayName),
            "unique_name" => Some(Self::UniqueName),
            "either" => Some(Self::Either),
            _ => None,
        }
    }
}

impl fmt::Display for OwnerIdentityFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-owned field requirements and export scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPolicy {
    /// Types included in the agent contract export; empty means all known types.
    pub export_work_item_types: Vec<String>,
    /// Allowed canonical field keys per type; an absent or empty entry allows any key.
    pub allowed_fields: BTreeMap<String, Vec<String>>,
    /// Policy-declared required canonical field keys per type.
    pub required_fields: BTreeMap<String, Vec<String>>,
    /// Description sections that must appear per type.
    pub description_required_sections: BTreeMap<String, Vec<String>>,
    /// Description sections that may appear per type.
    pub description_optional_sections: BTreeMap<String, Vec<String>>,
    /// Owner identity matching mode.
    pub owner_identity_format: OwnerIdentityFormat,
}

impl FieldPolicy {
    /// Loads `field_policy.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the document is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_document(path)
    }

    /// Returns the allowed keys for a type; empty means unrestricted.
    #[must_use]
    pub fn allowed_for(&self, canonical_type: &str) -> &[String] {
        self.allowed_fields.get(canonical_type).map_or(&[], Vec::as_slice)
    }

    /// Returns the policy-declared required keys for a type.
    #[must_use]
    pub fn required_for(&self, canonical_type: &str) -> &[String] {
        self.required_fields.get(canonical_type).map_or(&[], Vec::as_slice)
    }
}

/// Raw `agent_contract_export` block.
#[derive(Deserialize)]
struct RawExportScope {
    /// Types included in the export.
    include_work_item_types: Option<StringList>,
}

/// Raw `owner_identity` block.
#[derive(Deserialize)]
struct RawOwnerIdentity {
    /// Owner identity format name.
    format: Option<String>,
}

/// Raw `field_policy.yaml`.
#[derive(Deserialize)]
struct RawFieldPolicy {
    /// Export scope block.
    agent_contract_export: Option<RawExportScope>,
    /// Allowed canonical field keys per type.
    allowed_fields: Option<TypeLists>,
    /// Required canonical field keys per type.
    required_fields: Option<TypeLists>,
    /// Required description sections per type.
    description_required_sections: Option<TypeLists>,
    /// Optional description sections per type.
    description_optional_sections: Option<TypeLists>,
    /// Owner identity block.
    owner_identity: Option<RawOwnerIdentity>,
}

impl PolicyDocument for FieldPolicy {
    type Raw = RawFieldPolicy;

    fn validate(raw: RawFieldPolicy) -> Result<Self, String> {
        let export_work_item_types = raw
            .agent_contract_export
            .and_then(|block| block.include_work_item_types)
            .unwrap_or_default()
            .0;
        let owner_identity_format = match raw.owner_identity.and_then(|block| block.format) {
            None => OwnerIdentityFormat::default(),
            Some(format) => OwnerIdentityFormat::parse(&format)
                .ok_or("owner_identity.format must be one of display_name|unique_name|either")?,
        };
        Ok(Self {
            export_work_item_types,
            allowed_fields: type_lists(raw.allowed_fields, "allowed_fields")?,
            required_fields: type_lists(raw.required_fields, "required_fields")?,
            description_required_sections: type_lists(
                raw.description_required_sections,
                "description_required_sections",
            )?,
            description_optional_sections: type_lists(
                raw.description_optional_sections,
                "description_optional_sections",
            )?,
            owner_identity_format,
        })
    }
}

// ============================================================================
// SECTION: Link Policy
// ============================================================================

/// Hierarchy rules for parent links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkPolicy {
    /// Link types bundles may express.
    pub allowed_link_types: Vec<String>,
    /// Maximum local hierarchy depth, counting the item itself.
    pub max_depth: u32,
    /// Types that may not be parented by an item of the same type.
    pub forbid_double_nesting: Vec<String>,
}

impl LinkPolicy {
    /// Loads `link_policy.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the document is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_document(path)
    }

    /// Returns true when same-type parenting is forbidden for the type.
    #[must_use]
    pub fn forbids_double_nesting(&self, canonical_type: &str) -> bool {
        self.forbid_double_nesting.iter().any(|entry| entry == canonical_type)
    }
}

/// Raw `link_policy.yaml`.
#[derive(Deserialize)]
struct RawLinkPolicy {
    /// Link types bundles may express.
    allowed_link_types: Option<StringList>,
    /// Maximum local hierarchy depth.
    max_depth: Option<i64>,
    /// Types that may not nest under themselves.
    forbid_double_nesting: Option<StringList>,
}

impl PolicyDocument for LinkPolicy {
    type Raw = RawLinkPolicy;

    fn validate(raw: RawLinkPolicy) -> Result<Self, String> {
        let allowed_link_types =
            raw.allowed_link_types.ok_or("allowed_link_types must be a list of strings")?.0;
        let max_depth = raw
            .max_depth
            .and_then(|depth| u32::try_from(depth).ok())
            .filter(|depth| *depth >= 1)
            .ok_or("max_depth must be a positive integer")?;
        let forbid_double_nesting =
            raw.forbid_double_nesting.ok_or("forbid_double_nesting must be a list of strings")?.0;
        Ok(Self {
            allowed_link_types,
            max_depth,
            forbid_double_nesting,
        })
    }
}

// ============================================================================
// SECTION: Standards
// ============================================================================

/// Free-form content rule for one field of one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StandardRule(Value);

impl StandardRule {
    /// Wraps a rule body.
    #[must_use]
    pub const fn new(body: Value) -> Self {
        Self(body)
    }

    /// Returns true when the rule carries `required: true`.
    #[must_use]
    pub fn is_required(&self) -> bool {
        matches!(self.0.get("required"), Some(Value::Bool(true)))
    }

    /// Returns the raw rule body.
    #[must_use]
    pub const fn body(&self) -> &Value {
        &self.0
    }
}

/// Content standards applied across work items.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StandardsPolicy {
    /// Tags every work item must carry (item or bundle context).
    pub required_tags: Vec<String>,
    /// Per-type field rules.
    pub work_item_standards: BTreeMap<String, BTreeMap<String, StandardRule>>,
}

impl StandardsPolicy {
    /// Loads `standards.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the document is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_document(path)
    }
}

/// Raw `standards.yaml`.
#[derive(Deserialize)]
struct RawStandardsPolicy {
    /// Tags every work item must carry.
    required_tags: Option<StringList>,
    /// Per-type field rules.
    work_item_standards: Option<BTreeMap<String, BTreeMap<String, StandardRule>>>,
}

impl PolicyDocument for StandardsPolicy {
    type Raw = RawStandardsPolicy;

    fn validate(raw: RawStandardsPolicy) -> Result<Self, String> {
        let mut work_item_standards = BTreeMap::new();
        for (raw_type, rules) in raw.work_item_standards.unwrap_or_default() {
            let canonical_type = trimmed_key(&raw_type, "work_item_standards")?;
            let section = format!("work_item_standards.{canonical_type}");
            let mut parsed = BTreeMap::new();
            for (raw_field, rule) in rules {
                parsed.insert(trimmed_key(&raw_field, &section)?, rule);
            }
            work_item_standards.insert(canonical_type, parsed);
        }
        Ok(Self {
            required_tags: raw.required_tags.unwrap_or_default().0,
            work_item_standards,
        })
    }
}

// ============================================================================
// SECTION: Generated Wit Contract
// ============================================================================

/// Field availability for one remote work-item type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WitCapabilities {
    /// Reference names the remote type exposes.
    pub field_reference_names: BTreeSet<String>,
    /// Reference names the remote type requires.
    pub required_field_reference_names: BTreeSet<String>,
}

impl WitCapabilities {
    /// Returns true when the remote type exposes the reference name.
    #[must_use]
    pub fn has_field(&self, reference_name: &str) -> bool {
        self.field_reference_names.contains(reference_name)
    }
}

/// Harvested remote metadata keyed by remote type name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeneratedWitContract {
    /// Capabilities per remote type.
    pub work_item_types: BTreeMap<String, WitCapabilities>,
}

impl GeneratedWitContract {
    /// Loads `wit_contract.yaml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the document is unreadable or malformed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        load_document(path)
    }

    /// Returns the capabilities for a remote type.
    #[must_use]
    pub fn get(&self, remote_type: &str) -> Option<&WitCapabilities> {
        self.work_item_types.get(remote_type)
    }
}

/// Raw field metadata entry of a harvested remote type.
#[derive(Deserialize)]
struct RawWitField {
    /// Field reference name, in either harvested spelling.
    #[serde(alias = "referenceName")]
    reference_name: Option<String>,
    /// Required flag.
    required: Option<bool>,
    /// Always-required flag.
    #[serde(rename = "alwaysRequired")]
    always_required: Option<bool>,
}

/// Raw harvested remote type.
#[derive(Deserialize)]
struct RawWitType {
    /// Field metadata entries; entries that do not decode are skipped.
    fields: Option<Vec<Value>>,
}

/// Raw `wit_contract.yaml`.
#[derive(Deserialize)]
struct RawWitContract {
    /// Remote type name to metadata.
    work_item_types: Option<BTreeMap<String, RawWitType>>,
}

impl PolicyDocument for GeneratedWitContract {
    type Raw = RawWitContract;

    fn validate(raw: RawWitContract) -> Result<Self, String> {
        let types = raw.work_item_types.ok_or("work_item_types must be a mapping")?;
        let mut work_item_types = BTreeMap::new();
        for (raw_name, payload) in types {
            let remote_type = trimmed_key(&raw_name, "work_item_types")?;
            let fields = payload
                .fields
                .ok_or_else(|| format!("work_item_types['{remote_type}'].fields must be a list"))?;
            let mut capabilities = WitCapabilities::default();
            for entry in fields.into_iter().filter(Value::is_mapping) {
                let Ok(field) = serde_yaml::from_value::<RawWitField>(entry) else {
                    continue;
                };
                let Some(reference_name) = trimmed(field.reference_name) else {
                    continue;
                };
                if field.required == Some(true) || field.always_required == Some(true) {
                    capabilities.required_field_reference_names.insert(reference_name.clone());
                }
                capabilities.field_reference_names.insert(reference_name);
            }
            work_item_types.insert(remote_type, capabilities);
        }
        Ok(Self {
            work_item_types,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
