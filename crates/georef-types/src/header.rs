//! Header fields of a memorial descritivo
//!
//! The header block ("Imóvel: ...", "Matrícula: ...") identifies the property
//! and the professional responsible for the survey. Values are kept exactly as
//! written; numeric interpretation belongs to the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A header field the cross-reference rules know about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    PropertyName,
    Owner,
    Municipality,
    Registration,
    PropertyCode,
    DeclaredArea,
    DeclaredPerimeter,
    TechnicalResponsible,
    AccreditationCode,
    ReferenceSystem,
    PrecisionClass,
}

impl FieldKey {
    pub const ALL: [FieldKey; 11] = [
        FieldKey::PropertyName,
        FieldKey::Owner,
        FieldKey::Municipality,
        FieldKey::Registration,
        FieldKey::PropertyCode,
        FieldKey::DeclaredArea,
        FieldKey::DeclaredPerimeter,
        FieldKey::TechnicalResponsible,
        FieldKey::AccreditationCode,
        FieldKey::ReferenceSystem,
        FieldKey::PrecisionClass,
    ];

    /// Portuguese label used in messages
    pub fn label(&self) -> &'static str {
        match self {
            FieldKey::PropertyName => "Imóvel",
            FieldKey::Owner => "Proprietário",
            FieldKey::Municipality => "Município",
            FieldKey::Registration => "Matrícula",
            FieldKey::PropertyCode => "Código INCRA/SNCR",
            FieldKey::DeclaredArea => "Área",
            FieldKey::DeclaredPerimeter => "Perímetro",
            FieldKey::TechnicalResponsible => "Responsável Técnico",
            FieldKey::AccreditationCode => "Código de Credenciamento",
            FieldKey::ReferenceSystem => "Sistema de Referência",
            FieldKey::PrecisionClass => "Classe de Precisão",
        }
    }

    pub fn missing_code(&self) -> &'static str {
        match self {
            FieldKey::PropertyName => "MISSING_FIELD_PROPERTY_NAME",
            FieldKey::Owner => "MISSING_FIELD_OWNER",
            FieldKey::Municipality => "MISSING_FIELD_MUNICIPALITY",
            FieldKey::Registration => "MISSING_FIELD_REGISTRATION",
            FieldKey::PropertyCode => "MISSING_FIELD_PROPERTY_CODE",
            FieldKey::DeclaredArea => "MISSING_FIELD_DECLARED_AREA",
            FieldKey::DeclaredPerimeter => "MISSING_FIELD_DECLARED_PERIMETER",
            FieldKey::TechnicalResponsible => "MISSING_FIELD_TECHNICAL_RESPONSIBLE",
            FieldKey::AccreditationCode => "MISSING_FIELD_ACCREDITATION_CODE",
            FieldKey::ReferenceSystem => "MISSING_FIELD_REFERENCE_SYSTEM",
            FieldKey::PrecisionClass => "MISSING_FIELD_PRECISION_CLASS",
        }
    }

    pub fn malformed_code(&self) -> &'static str {
        match self {
            FieldKey::PropertyName => "MALFORMED_FIELD_PROPERTY_NAME",
            FieldKey::Owner => "MALFORMED_FIELD_OWNER",
            FieldKey::Municipality => "MALFORMED_FIELD_MUNICIPALITY",
            FieldKey::Registration => "MALFORMED_FIELD_REGISTRATION",
            FieldKey::PropertyCode => "MALFORMED_FIELD_PROPERTY_CODE",
            FieldKey::DeclaredArea => "MALFORMED_FIELD_DECLARED_AREA",
            FieldKey::DeclaredPerimeter => "MALFORMED_FIELD_DECLARED_PERIMETER",
            FieldKey::TechnicalResponsible => "MALFORMED_FIELD_TECHNICAL_RESPONSIBLE",
            FieldKey::AccreditationCode => "MALFORMED_FIELD_ACCREDITATION_CODE",
            FieldKey::ReferenceSystem => "MALFORMED_FIELD_REFERENCE_SYSTEM",
            FieldKey::PrecisionClass => "MALFORMED_FIELD_PRECISION_CLASS",
        }
    }
}

/// A header value and the line it was read from (1-based)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderField {
    pub value: String,
    pub line: usize,
}

/// Header fields found in one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentHeader {
    pub fields: BTreeMap<FieldKey, HeaderField>,
}

impl DocumentHeader {
    pub fn get(&self, key: FieldKey) -> Option<&str> {
        self.fields.get(&key).map(|f| f.value.as_str())
    }

    /// Record a field; the first occurrence wins
    pub fn insert(&mut self, key: FieldKey, value: String, line: usize) {
        self.fields.entry(key).or_insert(HeaderField { value, line });
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.fields.contains_key(&key)
    }
}
