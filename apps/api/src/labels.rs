//! Status catalogs: canonical status codes and their display labels.
//!
//! Only the canonical code (e.g. `SIGNED`) is ever stored, filtered or
//! grouped on. Labels and colors are looked up at render time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ar,
}

impl Locale {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" | "en-us" | "en-gb" => Some(Self::En),
            "ar" | "ar-sa" | "ar-eg" => Some(Self::Ar),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusDef {
    pub code: &'static str,
    pub en: &'static str,
    pub ar: &'static str,
    pub color: &'static str,
}

impl StatusDef {
    pub fn label(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => self.en,
            Locale::Ar => self.ar,
        }
    }
}

#[derive(Debug)]
pub struct StatusCatalog {
    pub name: &'static str,
    pub statuses: &'static [StatusDef],
}

/// Rendered form of a status for one row.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusLabel {
    pub code: String,
    pub label: String,
    pub color: String,
}

const UNKNOWN_COLOR: &str = "#9e9e9e";

impl StatusCatalog {
    pub fn get(&self, code: &str) -> Option<&StatusDef> {
        self.statuses.iter().find(|s| s.code == code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.statuses.iter().map(|s| s.code)
    }

    /// Maps a stored value back to its canonical code. Accepts the code in any
    /// ASCII case, or either label (legacy rows stored the Arabic label).
    pub fn canonicalize(&self, raw: &str) -> Option<&'static str> {
        let raw = raw.trim();
        self.statuses
            .iter()
            .find(|s| {
                s.code.eq_ignore_ascii_case(raw)
                    || s.en.eq_ignore_ascii_case(raw)
                    || s.ar == raw
            })
            .map(|s| s.code)
    }

    /// Unknown codes render as themselves in neutral grey.
    pub fn label(&self, code: &str, locale: Locale) -> StatusLabel {
        match self.get(code) {
            Some(def) => StatusLabel {
                code: def.code.to_string(),
                label: def.label(locale).to_string(),
                color: def.color.to_string(),
            },
            None => StatusLabel {
                code: code.to_string(),
                label: code.to_string(),
                color: UNKNOWN_COLOR.to_string(),
            },
        }
    }
}

pub static CLIENT_STATUS: StatusCatalog = StatusCatalog {
    name: "client",
    statuses: &[
        StatusDef { code: "NEW", en: "New", ar: "جديد", color: "#2196f3" },
        StatusDef { code: "CONTACTED", en: "Contacted", ar: "تم التواصل", color: "#00bcd4" },
        StatusDef { code: "NEGOTIATING", en: "Negotiating", ar: "قيد التفاوض", color: "#ff9800" },
        StatusDef { code: "SIGNED", en: "Signed", ar: "تم التوقيع", color: "#4caf50" },
        StatusDef { code: "LOST", en: "Lost", ar: "مفقود", color: "#f44336" },
    ],
};

pub static JOB_STATUS: StatusCatalog = StatusCatalog {
    name: "job",
    statuses: &[
        StatusDef { code: "OPEN", en: "Open", ar: "مفتوحة", color: "#4caf50" },
        StatusDef { code: "ON_HOLD", en: "On hold", ar: "معلقة", color: "#ff9800" },
        StatusDef { code: "CLOSED", en: "Closed", ar: "مغلقة", color: "#9e9e9e" },
        StatusDef { code: "FILLED", en: "Filled", ar: "تم شغلها", color: "#3f51b5" },
    ],
};

pub static CANDIDATE_STATUS: StatusCatalog = StatusCatalog {
    name: "candidate",
    statuses: &[
        StatusDef { code: "NEW", en: "New", ar: "جديد", color: "#2196f3" },
        StatusDef { code: "SCREENING", en: "Screening", ar: "قيد الفرز", color: "#00bcd4" },
        StatusDef { code: "INTERVIEW", en: "Interview", ar: "مقابلة", color: "#9c27b0" },
        StatusDef { code: "OFFERED", en: "Offered", ar: "تم تقديم عرض", color: "#ff9800" },
        StatusDef { code: "ACCEPTED", en: "Accepted", ar: "مقبول", color: "#4caf50" },
        StatusDef { code: "REJECTED", en: "Rejected", ar: "مرفوض", color: "#f44336" },
    ],
};

pub static INTERVIEW_STATUS: StatusCatalog = StatusCatalog {
    name: "interview",
    statuses: &[
        StatusDef { code: "SCHEDULED", en: "Scheduled", ar: "مجدولة", color: "#2196f3" },
        StatusDef { code: "COMPLETED", en: "Completed", ar: "مكتملة", color: "#4caf50" },
        StatusDef { code: "CANCELLED", en: "Cancelled", ar: "ملغاة", color: "#f44336" },
        StatusDef { code: "NO_SHOW", en: "No show", ar: "لم يحضر", color: "#795548" },
    ],
};

pub static CONTRACT_STATUS: StatusCatalog = StatusCatalog {
    name: "contract",
    statuses: &[
        StatusDef { code: "DRAFT", en: "Draft", ar: "مسودة", color: "#9e9e9e" },
        StatusDef { code: "SENT", en: "Sent", ar: "مرسل", color: "#00bcd4" },
        StatusDef { code: "SIGNED", en: "Signed", ar: "موقع", color: "#4caf50" },
        StatusDef { code: "EXPIRED", en: "Expired", ar: "منتهي", color: "#f44336" },
    ],
};

pub static REMINDER_STATUS: StatusCatalog = StatusCatalog {
    name: "reminder",
    statuses: &[
        StatusDef { code: "PENDING", en: "Pending", ar: "قيد الانتظار", color: "#ff9800" },
        StatusDef { code: "DONE", en: "Done", ar: "تم", color: "#4caf50" },
    ],
};

pub static PAYMENT_STATUS: StatusCatalog = StatusCatalog {
    name: "payment",
    statuses: &[
        StatusDef { code: "PAID", en: "Paid", ar: "مدفوع", color: "#4caf50" },
        StatusDef { code: "PENDING", en: "Pending", ar: "قيد الانتظار", color: "#ff9800" },
        StatusDef { code: "OVERDUE", en: "Overdue", ar: "متأخر", color: "#f44336" },
    ],
};
