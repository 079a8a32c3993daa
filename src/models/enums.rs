use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(CaseStatus {
    Pending => "PENDING",
    Approved => "APPROVED",
    Rejected => "REJECTED",
    Escalated => "ESCALATED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Forwarded => "FORWARDED",
    FinancialApproved => "FINANCIAL_APPROVED",
    OrderReleased => "ORDER_RELEASED",
});

impl CaseStatus {
    /// No further workflow step follows these.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }

    /// Title-cased label for table badges, e.g. `Financial Approved`.
    pub fn label(&self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_string() + &chars.as_str().to_ascii_lowercase()
                    }
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

str_enum!(Role {
    Citizen => "CITIZEN",
    Cmo => "CMO",
    Sdm => "SDM",
    Dm => "DM",
    AirTeam => "AIR_TEAM",
    ItAdmin => "IT_ADMIN",
});

impl Role {
    /// Roles that work the case queue (everyone except citizens).
    pub fn is_staff(&self) -> bool {
        !matches!(self, Self::Citizen)
    }
}

str_enum!(ExportFormat {
    Csv => "csv",
    Xlsx => "xlsx",
    Pdf => "pdf",
});

impl ExportFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Pdf => "application/pdf",
        }
    }
}

str_enum!(SearchKind {
    Enquiries => "enquiries",
    Hospitals => "hospitals",
    Districts => "districts",
    Users => "users",
    Ambulances => "ambulances",
});
