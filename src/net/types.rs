//! Wire DTOs for the plant-log REST backend.
//!
//! DESIGN
//! ======
//! Field names mirror the backend's JSON (Spanish column names) so serde
//! round-trips stay lossless. The current-user payload carries its role
//! either as a bare category string (older sessions) or as a nested role
//! object; [`Role`] accepts both and exposes one category accessor.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Category label for plant administrators.
pub const ADMINISTRADOR: &str = "ADMINISTRADOR";
/// Category label for plant operators.
pub const OPERADOR: &str = "OPERADOR";
/// Legacy alias some stored sessions and route tables still use for administrators.
pub const ADMIN_ALIAS: &str = "ADMIN";

// =============================================================================
// AUTH
// =============================================================================

/// Successful response of `POST /api/auth/token`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

/// Role summary as served by `/api/roles` and nested inside user payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSummary {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub nombre: String,
    pub categoria: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activo: Option<bool>,
}

/// A user's role, in either of the shapes the backend has served over time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Role {
    /// Bare category label, e.g. `"OPERADOR"`.
    Category(String),
    /// Full role object with id, display name and category.
    Detailed(RoleSummary),
}

impl Role {
    /// Coarse authorization category of this role.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Category(category) => category,
            Self::Detailed(role) => &role.categoria,
        }
    }

    /// Human-readable role name, falling back to the category.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::Category(category) => category,
            Self::Detailed(role) if role.nombre.is_empty() => &role.categoria,
            Self::Detailed(role) => &role.nombre,
        }
    }

    /// Whether this role's category is in `allowed`, treating `ADMIN` and
    /// `ADMINISTRADOR` as the same category on both sides.
    #[must_use]
    pub fn is_any_of(&self, allowed: &[&str]) -> bool {
        category_allowed(self.category(), allowed)
    }
}

/// Map the legacy `ADMIN` label onto `ADMINISTRADOR`; everything else is kept.
#[must_use]
pub fn normalize_category(category: &str) -> &str {
    if category == ADMIN_ALIAS { ADMINISTRADOR } else { category }
}

/// Category membership check shared by the session manager and menu helpers.
#[must_use]
pub fn category_allowed(category: &str, allowed: &[&str]) -> bool {
    let category = normalize_category(category);
    allowed
        .iter()
        .any(|candidate| normalize_category(candidate) == category)
}

/// Identity of the signed-in user, as returned by `GET /api/auth/me`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub apellido: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
    pub rol: Role,
    #[serde(default = "default_true")]
    pub activo: bool,
    #[serde(default)]
    pub fecha_contratacion: Option<String>,
    /// Path of the profile photo relative to the backend origin.
    #[serde(default)]
    pub foto_perfil: Option<String>,
}

fn default_true() -> bool {
    true
}

impl User {
    /// "Nombre Apellido", or the username when both are empty.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.nombre, self.apellido);
        let full = full.trim();
        if full.is_empty() { self.username.clone() } else { full.to_owned() }
    }

    #[must_use]
    pub fn category(&self) -> &str {
        self.rol.category()
    }
}

/// Mutable profile fields merged into the session user after a profile edit.
///
/// `None` leaves the current value untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub nombre: Option<String>,
    pub email: Option<String>,
    pub foto_perfil: Option<String>,
}

impl ProfileUpdate {
    /// Apply the present fields to `user`.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(nombre) = &self.nombre {
            user.nombre.clone_from(nombre);
        }
        if let Some(email) = &self.email {
            user.email = Some(email.clone());
        }
        if let Some(foto) = &self.foto_perfil {
            user.foto_perfil = Some(foto.clone());
        }
    }
}

// =============================================================================
// USER ADMINISTRATION
// =============================================================================

/// A managed user as listed by `/api/usuarios`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usuario {
    #[serde(deserialize_with = "deserialize_i64_from_number")]
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub nombre: String,
    #[serde(default)]
    pub apellido: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub telefono: Option<String>,
    #[serde(default)]
    pub rol: Option<RoleSummary>,
    #[serde(default)]
    pub rol_id: Option<i64>,
    #[serde(default = "default_true")]
    pub activo: bool,
    #[serde(default)]
    pub fecha_contratacion: Option<String>,
    #[serde(default)]
    pub foto_perfil: Option<String>,
    #[serde(default)]
    pub nombre_completo: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl From<&Usuario> for ProfileUpdate {
    fn from(usuario: &Usuario) -> Self {
        Self {
            nombre: Some(usuario.nombre.clone()),
            email: usuario.email.clone(),
            foto_perfil: usuario.foto_perfil.clone(),
        }
    }
}

/// Body of `POST /api/usuarios/`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUsuario {
    pub nombre: String,
    pub apellido: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telefono: Option<String>,
    pub username: String,
    pub password: String,
    pub rol_id: i64,
    pub activo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fecha_contratacion: Option<String>,
}

/// Partial update for `PUT /api/usuarios/{id}`, sent as a multipart form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsuarioUpdate {
    pub nombre: Option<String>,
    pub apellido: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub telefono: Option<String>,
    pub rol_id: Option<i64>,
    pub activo: Option<bool>,
    pub fecha_contratacion: Option<String>,
    pub password: Option<String>,
}

impl UsuarioUpdate {
    /// Form fields to send, in a stable order.
    ///
    /// Names and usernames are sent as given; optional contact fields are
    /// dropped when empty and the password is dropped when blank, so an edit
    /// never wipes them by accident.
    #[must_use]
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        if let Some(nombre) = &self.nombre {
            fields.push(("nombre", nombre.clone()));
        }
        if let Some(apellido) = &self.apellido {
            fields.push(("apellido", apellido.clone()));
        }
        if let Some(username) = &self.username {
            fields.push(("username", username.clone()));
        }
        push_non_empty(&mut fields, "email", self.email.as_deref());
        push_non_empty(&mut fields, "telefono", self.telefono.as_deref());
        if let Some(rol_id) = self.rol_id {
            fields.push(("rol_id", rol_id.to_string()));
        }
        if let Some(activo) = self.activo {
            fields.push(("activo", if activo { "true" } else { "false" }.to_owned()));
        }
        push_non_empty(&mut fields, "fecha_contratacion", self.fecha_contratacion.as_deref());
        if let Some(password) = &self.password
            && !password.trim().is_empty()
        {
            fields.push(("password", password.clone()));
        }
        fields
    }
}

fn push_non_empty(fields: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<&str>) {
    if let Some(value) = value
        && !value.is_empty()
    {
        fields.push((name, value.to_owned()));
    }
}

#[allow(clippy::cast_possible_truncation)]
fn deserialize_i64_from_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                return Ok(int);
            }
            #[allow(clippy::cast_precision_loss)]
            if let Some(float) = number.as_f64()
                && float.is_finite()
                && float.fract() == 0.0
                && float >= i64::MIN as f64
                && float <= i64::MAX as f64
            {
                return Ok(float as i64);
            }
            Err(D::Error::custom("expected integer-compatible number"))
        }
        _ => Err(D::Error::custom("expected number")),
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
