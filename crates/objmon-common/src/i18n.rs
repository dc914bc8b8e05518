//! Lightweight i18n translation registry.
//!
//! Static translation map keyed by `(locale, message_key)`.
//! Supported locales: `es`, `en`. Templates use `{name}` placeholders that
//! callers substitute themselves.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Default locale when none is configured.
pub const DEFAULT_LOCALE: &str = "es";

/// Supported locales.
pub const SUPPORTED_LOCALES: &[&str] = &["es", "en"];

/// Central translation registry.
pub struct Translations {
    map: HashMap<(&'static str, &'static str), &'static str>,
}

impl Translations {
    /// Get a translated string for the given locale and key.
    /// Falls back to `en` if the locale is not found, then to the provided default.
    pub fn get<'a>(&self, locale: &str, key: &str, default: &'a str) -> &'a str {
        if let Some(&val) = self.map.get(&(locale, key)) {
            return val;
        }
        if locale != "en" {
            if let Some(&val) = self.map.get(&("en", key)) {
                return val;
            }
        }
        default
    }
}

/// Global translation singleton.
pub static TRANSLATIONS: LazyLock<Translations> = LazyLock::new(|| {
    let mut map = HashMap::new();

    macro_rules! t {
        ($locale:expr, $key:expr, $val:expr) => {
            map.insert(($locale, $key), $val);
        };
    }

    // ---- Default alert texts ----

    t!("es", "alert.default_title", "Alerta: {title}");
    t!("en", "alert.default_title", "Alert: {title}");
    t!(
        "es",
        "alert.default_message",
        "El objetivo \"{title}\" cumple las condiciones de la regla \"{rule}\" (progreso: {progress}%)"
    );
    t!(
        "en",
        "alert.default_message",
        "Objective \"{title}\" meets the conditions of rule \"{rule}\" (progress: {progress}%)"
    );

    // ---- Noise assessment ----

    t!(
        "es",
        "noise.high.reason",
        "La regla coincide con el {pct}% de los objetivos ({matched} de {total}); generaría demasiadas alertas"
    );
    t!(
        "en",
        "noise.high.reason",
        "The rule matches {pct}% of objectives ({matched} of {total}) and would generate too many alerts"
    );
    t!(
        "es",
        "noise.high.narrow_conditions",
        "Restringe las condiciones para que sean más específicas"
    );
    t!(
        "en",
        "noise.high.narrow_conditions",
        "Narrow the conditions to make them more specific"
    );
    t!(
        "es",
        "noise.high.add_filters",
        "Añade filtros por responsable o categoría"
    );
    t!("en", "noise.high.add_filters", "Add responsible or category filters");

    t!(
        "es",
        "noise.medium.reason",
        "La regla coincide con el {pct}% de los objetivos ({matched} de {total}); nivel de ruido moderado"
    );
    t!(
        "en",
        "noise.medium.reason",
        "The rule matches {pct}% of objectives ({matched} of {total}); moderate noise"
    );
    t!(
        "es",
        "noise.medium.add_conditions",
        "Considera añadir condiciones adicionales para reducir falsos positivos"
    );
    t!(
        "en",
        "noise.medium.add_conditions",
        "Consider adding conditions to reduce false positives"
    );

    t!(
        "es",
        "noise.low.reason",
        "La regla coincide con el {pct}% de los objetivos ({matched} de {total}); nivel de ruido aceptable"
    );
    t!(
        "en",
        "noise.low.reason",
        "The rule matches {pct}% of objectives ({matched} of {total}); acceptable noise"
    );
    t!(
        "es",
        "noise.low.no_matches",
        "La regla no coincide con ningún objetivo, verifica las condiciones"
    );
    t!(
        "en",
        "noise.low.no_matches",
        "Rule matches no objectives, verify conditions"
    );

    Translations { map }
});

/// Check if a locale string is supported.
pub fn is_supported_locale(locale: &str) -> bool {
    SUPPORTED_LOCALES.contains(&locale)
}

/// Return the locale if supported, otherwise the default.
pub fn normalize_locale(locale: &str) -> &str {
    if is_supported_locale(locale) {
        locale
    } else {
        DEFAULT_LOCALE
    }
}
