// ── Localization ──
//
// Supported locales and the fixed string tables used by status labels,
// state text, and user-facing error messages.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// A supported UI language, identified by its ISO 639-1 code.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Locale {
    #[default]
    #[serde(rename = "en")]
    #[strum(serialize = "en")]
    English,
    #[serde(rename = "es")]
    #[strum(serialize = "es")]
    Spanish,
}

impl Locale {
    pub fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Spanish => "es",
        }
    }

    /// Parse a language tag, ignoring any region suffix (`es-AR` → Spanish).
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.trim().split(['-', '_']).next()?;
        primary.parse().ok()
    }
}

/// Keys of the fixed string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    StatusConnected,
    StatusAlarm,
    StatusWarning,
    StatusDisconnected,
    StateOk,
    StateArmed,
    StateDisarmed,
    StateMonitoring,
    StateOff,
    StateUnknown,
    StateAlarm,
    StateNormal,
    ErrorNetwork,
    ErrorNoSession,
    ErrorUnknown,
}

/// Look up a string in the given locale.
pub fn text(message: Message, locale: Locale) -> &'static str {
    match locale {
        Locale::English => english(message),
        Locale::Spanish => spanish(message),
    }
}

fn english(message: Message) -> &'static str {
    match message {
        Message::StatusConnected => "Connected",
        Message::StatusAlarm => "Active Alarm",
        Message::StatusWarning => "No recent data available",
        Message::StatusDisconnected => "Disconnected",
        Message::StateOk => "OK",
        Message::StateArmed => "Armed",
        Message::StateDisarmed => "Disarmed",
        Message::StateMonitoring => "Monitoring",
        Message::StateOff => "Off",
        Message::StateUnknown => "Unknown state",
        Message::StateAlarm => "Alarm",
        Message::StateNormal => "Normal",
        Message::ErrorNetwork => "Could not reach the server. Check your connection and try again.",
        Message::ErrorNoSession => "Your session has ended. Please sign in again.",
        Message::ErrorUnknown => "Something went wrong. Please try again later.",
    }
}

fn spanish(message: Message) -> &'static str {
    match message {
        Message::StatusConnected => "Conectado",
        Message::StatusAlarm => "Alarma activa",
        Message::StatusWarning => "Sin datos recientes",
        Message::StatusDisconnected => "Desconectado",
        Message::StateOk => "OK",
        Message::StateArmed => "Armado",
        Message::StateDisarmed => "Desarmado",
        Message::StateMonitoring => "Monitorizando",
        Message::StateOff => "Apagado",
        Message::StateUnknown => "Estado desconocido",
        Message::StateAlarm => "Alarma",
        Message::StateNormal => "Normal",
        Message::ErrorNetwork => {
            "No se pudo conectar con el servidor. Revisa tu conexión e inténtalo de nuevo."
        }
        Message::ErrorNoSession => "Tu sesión ha finalizado. Vuelve a iniciar sesión.",
        Message::ErrorUnknown => "Algo salió mal. Inténtalo de nuevo más tarde.",
    }
}

/// Canned text for well-known identity-provider error codes.
pub fn identity_message(code: &str, locale: Locale) -> Option<&'static str> {
    let text = match (code, locale) {
        ("EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS", Locale::English) => {
            "Incorrect email or password."
        }
        ("EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS", Locale::Spanish) => {
            "Correo o contraseña incorrectos."
        }
        ("USER_DISABLED", Locale::English) => "This account has been disabled.",
        ("USER_DISABLED", Locale::Spanish) => "Esta cuenta ha sido deshabilitada.",
        ("EMAIL_EXISTS", Locale::English) => "That email address is already in use.",
        ("EMAIL_EXISTS", Locale::Spanish) => "Ese correo ya está en uso.",
        ("WEAK_PASSWORD", Locale::English) => "The password must be at least 6 characters.",
        ("WEAK_PASSWORD", Locale::Spanish) => "La contraseña debe tener al menos 6 caracteres.",
        ("TOO_MANY_ATTEMPTS_TRY_LATER", Locale::English) => {
            "Too many attempts. Please try again later."
        }
        ("TOO_MANY_ATTEMPTS_TRY_LATER", Locale::Spanish) => {
            "Demasiados intentos. Inténtalo más tarde."
        }
        ("INVALID_EMAIL", Locale::English) => "The email address is not valid.",
        ("INVALID_EMAIL", Locale::Spanish) => "El correo no es válido.",
        ("CREDENTIAL_TOO_OLD_LOGIN_AGAIN", Locale::English) => {
            "Please sign in again to make this change."
        }
        ("CREDENTIAL_TOO_OLD_LOGIN_AGAIN", Locale::Spanish) => {
            "Vuelve a iniciar sesión para hacer este cambio."
        }
        _ => return None,
    };
    Some(text)
}
