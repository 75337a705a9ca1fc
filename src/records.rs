//! Plant log forms: endpoints, required fields and report exports.
//!
//! SYSTEM CONTEXT
//! ==============
//! Each operator form posts a flat JSON object to its collection endpoint and
//! is listed back on the matching report page. The payload stays a
//! `serde_json::Map` because the backend owns the column schema; this module
//! only enforces what the forms themselves required before submitting.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::net::types::User;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("unknown form `{0}`")]
    UnknownKind(String),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` must be between {min} and {max}")]
    OutOfRange { field: &'static str, min: i64, max: i64 },
    #[error("invalid export period `{period}` (expected {expected})")]
    InvalidPeriod { period: String, expected: &'static str },
    #[error("{0} has no spreadsheet export")]
    NotExportable(FormKind),
}

/// Period granularity of a report's spreadsheet export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportPeriod {
    /// `YYYY-MM`, exported under `exportar-excel/mes/`.
    Month,
    /// `YYYY-MM-DD`, exported under `exportar-excel/fecha/`.
    Day,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormKind {
    ControlOperacion,
    ControlCloro,
    MonitoreoFisicoquimico,
    ProduccionFiltros,
    ConsumoDiario,
    ConsumoMensual,
}

impl FormKind {
    pub const ALL: [FormKind; 6] = [
        Self::ControlOperacion,
        Self::ControlCloro,
        Self::MonitoreoFisicoquimico,
        Self::ProduccionFiltros,
        Self::ConsumoDiario,
        Self::ConsumoMensual,
    ];

    /// Backend slug, also used on the command line.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::ControlOperacion => "control-operacion",
            Self::ControlCloro => "control-cloro",
            Self::MonitoreoFisicoquimico => "monitoreo-fisicoquimico",
            Self::ProduccionFiltros => "produccion-filtros",
            Self::ConsumoDiario => "consumo-diario",
            Self::ConsumoMensual => "consumo-mensual",
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::ControlOperacion => "Control de Operación",
            Self::ControlCloro => "Registro de Reactivos",
            Self::MonitoreoFisicoquimico => "Monitoreo Fisicoquímico",
            Self::ProduccionFiltros => "Producción por Filtros",
            Self::ConsumoDiario => "Consumo Diario",
            Self::ConsumoMensual => "Consumo Mensual",
        }
    }

    /// Collection endpoint, with the trailing slash the backend routes on.
    #[must_use]
    pub fn collection_path(self) -> String {
        format!("/api/{}/", self.slug())
    }

    /// Guarded route of the entry form.
    #[must_use]
    pub const fn form_route(self) -> &'static str {
        match self {
            Self::ControlOperacion => "/forms/control-operacion",
            Self::ControlCloro => "/forms/control-cloro",
            Self::MonitoreoFisicoquimico => "/forms/monitoreo-fisicoquimico",
            Self::ProduccionFiltros => "/forms/produccion-filtros",
            // The daily consumption form predates the backend rename.
            Self::ConsumoDiario => "/forms/consumo-quimicos",
            Self::ConsumoMensual => "/forms/consumo-mensual",
        }
    }

    /// Guarded route of the report page.
    #[must_use]
    pub const fn report_route(self) -> &'static str {
        match self {
            Self::ControlOperacion => "/reportes/control-operacion",
            Self::ControlCloro => "/reportes/cloro-libre",
            Self::MonitoreoFisicoquimico => "/reportes/monitoreo-fisicoquimico",
            Self::ProduccionFiltros => "/reportes/produccion-filtros",
            Self::ConsumoDiario => "/reportes/consumo-diario",
            Self::ConsumoMensual => "/reportes/consumo-mensual",
        }
    }

    #[must_use]
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::ControlOperacion | Self::ProduccionFiltros => &["fecha", "hora"],
            Self::ControlCloro => &["fecha_mes"],
            Self::MonitoreoFisicoquimico => &["fecha", "hora", "muestra_numero"],
            Self::ConsumoDiario => &["fecha", "quimico_id"],
            Self::ConsumoMensual => &["fecha", "mes", "anio"],
        }
    }

    #[must_use]
    pub fn export_period(self) -> Option<ExportPeriod> {
        match self {
            Self::ControlCloro => Some(ExportPeriod::Month),
            Self::ControlOperacion | Self::MonitoreoFisicoquimico | Self::ProduccionFiltros | Self::ConsumoDiario => {
                Some(ExportPeriod::Day)
            }
            Self::ConsumoMensual => None,
        }
    }

    /// Backend path of the spreadsheet export for `period`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::NotExportable`] for forms without an export and
    /// [`RecordError::InvalidPeriod`] when `period` does not match the
    /// export's granularity.
    pub fn export_path(self, period: &str) -> Result<String, RecordError> {
        let granularity = self.export_period().ok_or(RecordError::NotExportable(self))?;
        let segment = match granularity {
            ExportPeriod::Month if is_month(period) => "mes",
            ExportPeriod::Day if is_day(period) => "fecha",
            ExportPeriod::Month => {
                return Err(RecordError::InvalidPeriod { period: period.to_owned(), expected: "YYYY-MM" });
            }
            ExportPeriod::Day => {
                return Err(RecordError::InvalidPeriod { period: period.to_owned(), expected: "YYYY-MM-DD" });
            }
        };
        Ok(format!("/api/{}/exportar-excel/{segment}/{period}", self.slug()))
    }

    /// Download file name the report page used for an export.
    #[must_use]
    pub fn export_file_name(self, period: &str) -> String {
        let stem = match self {
            Self::ControlCloro => "registro_reactivos".to_owned(),
            other => other.slug().replace('-', "_"),
        };
        format!("{stem}_{period}.xlsx")
    }

    /// Check the payload against the form's own validators.
    ///
    /// # Errors
    ///
    /// Returns the first missing required field, or an out-of-range sample
    /// number for physicochemical monitoring.
    pub fn validate(self, payload: &Map<String, Value>) -> Result<(), RecordError> {
        for field in self.required_fields() {
            if is_blank(payload.get(*field)) {
                return Err(RecordError::MissingField(field));
            }
        }
        if self == Self::MonitoreoFisicoquimico {
            let sample = payload.get("muestra_numero").and_then(Value::as_i64);
            if !matches!(sample, Some(1..=3)) {
                return Err(RecordError::OutOfRange { field: "muestra_numero", min: 1, max: 3 });
            }
        }
        Ok(())
    }

    /// Attribute the record to the signed-in user when the payload does not
    /// name one, then validate it.
    ///
    /// # Errors
    ///
    /// See [`FormKind::validate`].
    pub fn prepare(self, mut payload: Map<String, Value>, user: Option<&User>) -> Result<Map<String, Value>, RecordError> {
        if payload.get("usuario_id").is_none_or(Value::is_null) {
            let id = user.and_then(|u| u.id).map_or(Value::Null, Value::from);
            payload.insert("usuario_id".to_owned(), id);
        }
        self.validate(&payload)?;
        Ok(payload)
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for FormKind {
    type Err = RecordError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.slug() == raw)
            .ok_or_else(|| RecordError::UnknownKind(raw.to_owned()))
    }
}

/// Query filters accepted by the report listings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
    pub mes: Option<u32>,
    pub anio: Option<i32>,
    pub quimico: Option<String>,
}

impl RecordFilter {
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(value) = self.fecha_inicio.as_deref().filter(|v| !v.is_empty()) {
            pairs.push(("fecha_inicio", value.to_owned()));
        }
        if let Some(value) = self.fecha_fin.as_deref().filter(|v| !v.is_empty()) {
            pairs.push(("fecha_fin", value.to_owned()));
        }
        if let Some(mes) = self.mes {
            pairs.push(("mes", mes.to_string()));
        }
        if let Some(anio) = self.anio {
            pairs.push(("anio", anio.to_string()));
        }
        if let Some(value) = self.quimico.as_deref().filter(|v| !v.is_empty()) {
            pairs.push(("quimico", value.to_owned()));
        }
        pairs
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_month(period: &str) -> bool {
    let mut parts = period.split('-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(year), Some(month), None) => {
            digits(year, 4) && digits(month, 2) && matches!(month.parse::<u8>(), Ok(1..=12))
        }
        _ => false,
    }
}

fn is_day(period: &str) -> bool {
    let Some((month, day)) = period.rsplit_once('-') else {
        return false;
    };
    is_month(month) && digits(day, 2) && matches!(day.parse::<u8>(), Ok(1..=31))
}

#[cfg(test)]
#[path = "records_test.rs"]
mod records_test;
