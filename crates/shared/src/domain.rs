use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::search::{SearchTerms, TermValue};

/// Backend identifier of a record. The fleet backend uses numeric keys, but
/// string keys are accepted so the client stays agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl FromStr for EntityId {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw.parse::<i64>() {
            Ok(value) => Self::Int(value),
            Err(_) => Self::Text(raw.to_string()),
        })
    }
}

/// One record returned by a collection. Only `id` is structural; every other
/// field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Field rendered the way a table cell or suggestion list shows it.
    pub fn display_field(&self, name: &str) -> Option<String> {
        if name == "id" {
            return Some(self.id.to_string());
        }
        match self.fields.get(name)? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Remote collections exposed by the fleet backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Bus,
    Engine,
    Transmission,
    Tire,
    Product,
    Stock,
    WorkOrder,
    WorkOrderItem,
}

impl Resource {
    pub const ALL: [Resource; 8] = [
        Resource::Bus,
        Resource::Engine,
        Resource::Transmission,
        Resource::Tire,
        Resource::Product,
        Resource::Stock,
        Resource::WorkOrder,
        Resource::WorkOrderItem,
    ];

    /// Path segment under the API base URL.
    pub fn path(self) -> &'static str {
        match self {
            Self::Bus => "onibus",
            Self::Engine => "motores",
            Self::Transmission => "cambios",
            Self::Tire => "pneus",
            Self::Product => "produtos",
            Self::Stock => "estoque",
            Self::WorkOrder => "ordens-servico",
            Self::WorkOrderItem => "itens-ordem-servico",
        }
    }

    /// Segment between the resource path and the record id on action
    /// endpoints. Stock movements are keyed by product.
    pub fn action_scope(self) -> Option<&'static str> {
        match self {
            Self::Stock => Some("produto"),
            _ => None,
        }
    }

    /// Closed vocabulary of an enum-valued filter field.
    pub fn choices(self, field: &str) -> Option<&'static [&'static str]> {
        match (self, field) {
            (Self::Bus, "status") => Some(BusStatus::VALUES),
            (Self::WorkOrder, "status") => Some(WorkOrderStatus::VALUES),
            (Self::WorkOrder, "tipo") => Some(WorkOrderKind::VALUES),
            (Self::Product, "status") => Some(ProductStatus::VALUES),
            (Self::Product | Self::Stock, "categoria") => Some(ProductCategory::VALUES),
            (Self::Product, "unidadeMedida") => Some(UnitOfMeasure::VALUES),
            _ => None,
        }
    }

    /// Rewrites enum-valued terms to their wire spelling, ignoring case.
    /// Blank values pass through untouched.
    pub fn normalize_terms(self, terms: &SearchTerms) -> Result<SearchTerms, InvalidChoice> {
        terms
            .iter()
            .map(|(field, value)| {
                let (Some(allowed), TermValue::Text(text)) = (self.choices(field), value) else {
                    return Ok((field.clone(), value.clone()));
                };
                if text.is_empty() {
                    return Ok((field.clone(), value.clone()));
                }
                allowed
                    .iter()
                    .find(|choice| choice.eq_ignore_ascii_case(text.trim()))
                    .map(|choice| (field.clone(), TermValue::from(*choice)))
                    .ok_or_else(|| InvalidChoice {
                        field: field.clone(),
                        value: text.clone(),
                        allowed,
                    })
            })
            .collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bus => "bus",
            Self::Engine => "engine",
            Self::Transmission => "transmission",
            Self::Tire => "tire",
            Self::Product => "product",
            Self::Stock => "stock",
            Self::WorkOrder => "work-order",
            Self::WorkOrderItem => "work-order-item",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource '{0}'")]
pub struct UnknownResource(pub String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {field}; expected one of {}", .allowed.join(", "))]
pub struct InvalidChoice {
    pub field: String,
    pub value: String,
    pub allowed: &'static [&'static str],
}

impl FromStr for Resource {
    type Err = UnknownResource;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|resource| resource.name() == wanted || resource.path() == wanted)
            .ok_or_else(|| UnknownResource(raw.to_string()))
    }
}

macro_rules! term_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Wire names, in declaration order.
            pub const VALUES: &'static [&'static str] = &[$($wire),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for TermValue {
            fn from(value: $name) -> Self {
                TermValue::Text(value.as_str().to_string())
            }
        }
    };
}

term_enum!(BusStatus {
    New => "NOVO",
    Available => "DISPONIVEL",
    InOperation => "EM_OPERACAO",
    InMaintenance => "EM_MANUTENCAO",
    InRefurbishment => "EM_REFORMA",
    Retired => "APOSENTADO",
    Sold => "VENDIDO",
});

term_enum!(WorkOrderKind {
    Corrective => "CORRETIVA",
    Preventive => "PREVENTIVA",
});

term_enum!(WorkOrderStatus {
    Open => "ABERTA",
    InProgress => "EM_EXECUCAO",
    Finished => "FINALIZADA",
    Cancelled => "CANCELADA",
});

term_enum!(ProductStatus {
    Active => "ATIVO",
    Inactive => "INATIVO",
});

term_enum!(ProductCategory {
    Transmission => "CAMBIO",
    Engine => "MOTOR",
    Tire => "PNEU",
    StockItem => "ITEM_DE_ESTOQUE",
    Tool => "FERRAMENTA",
    Other => "OUTRO",
});

term_enum!(UnitOfMeasure {
    Unit => "UNIDADE",
    Liter => "LITRO",
    Kilogram => "QUILOGRAMA",
    Gram => "GRAMA",
    Meter => "METRO",
    Centimeter => "CENTIMETRO",
    Pair => "PAR",
    Box => "CAIXA",
    Flask => "FRASCO",
    Can => "LATAO",
});

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn entity_keeps_unknown_fields_and_numeric_id() {
        let entity: Entity = serde_json::from_value(json!({
            "id": 4,
            "placa": "ABC1D23",
            "motor": { "id": 9, "marca": "Volvo" }
        }))
        .expect("decode entity");

        assert_eq!(entity.id, EntityId::Int(4));
        assert_eq!(entity.display_field("placa").as_deref(), Some("ABC1D23"));
        assert_eq!(entity.field("motor").and_then(|m| m.get("id")), Some(&json!(9)));
    }

    #[test]
    fn entity_without_id_is_rejected() {
        let err = serde_json::from_value::<Entity>(json!({ "placa": "X" }));
        assert!(err.is_err());
    }

    #[test]
    fn resource_parses_english_name_or_backend_path() {
        assert_eq!("bus".parse::<Resource>(), Ok(Resource::Bus));
        assert_eq!("ordens-servico".parse::<Resource>(), Ok(Resource::WorkOrder));
        assert!("garage".parse::<Resource>().is_err());
    }

    #[test]
    fn enum_terms_are_normalised_per_resource() {
        let terms = SearchTerms::new()
            .with("status", "em_execucao")
            .with("tipo", " Preventiva ")
            .with("numeroOS", "os-12");
        let normalised = Resource::WorkOrder
            .normalize_terms(&terms)
            .expect("known values");

        assert_eq!(normalised.get("status"), Some(&TermValue::from(WorkOrderStatus::InProgress)));
        assert_eq!(normalised.get("tipo"), Some(&TermValue::from(WorkOrderKind::Preventive)));
        assert_eq!(normalised.get("numeroOS"), Some(&TermValue::from("os-12")));
    }

    #[test]
    fn unknown_enum_term_lists_the_allowed_values() {
        let err = Resource::Product
            .normalize_terms(&SearchTerms::new().with("unidadeMedida", "galao"))
            .expect_err("galao is not a unit");
        assert_eq!(err.allowed, UnitOfMeasure::VALUES);
        assert!(err.to_string().contains("LITRO"));

        let blank = SearchTerms::new().with("categoria", "");
        assert_eq!(Resource::Stock.normalize_terms(&blank), Ok(blank.clone()));
        assert_eq!(
            Resource::Product.choices("status"),
            Some(ProductStatus::VALUES)
        );
        assert_eq!(Resource::Tire.choices("status"), None);
    }

    #[test]
    fn status_enums_use_backend_names() {
        assert_eq!(
            serde_json::to_value(BusStatus::InOperation).expect("encode"),
            json!("EM_OPERACAO")
        );
        assert_eq!(
            TermValue::from(WorkOrderStatus::InProgress),
            TermValue::Text("EM_EXECUCAO".into())
        );
    }
}
