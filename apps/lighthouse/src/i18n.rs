//! # String Tables
//!
//! Report text is written as placeholders, `i18n:<message id>`, and replaced
//! here after assembly. Locales resolve exactly, then by language, then fall
//! back to `en-US`; a message missing from a locale falls back the same way.

use lighthouse_core::{LighthouseError, Localizer, ReportRecord};
use std::collections::BTreeMap;

/// Prefix marking a message placeholder.
pub const PLACEHOLDER_PREFIX: &str = "i18n:";

pub const DEFAULT_LOCALE: &str = "en-US";

type StringTable = &'static [(&'static str, &'static str)];

struct Locale {
    code: &'static str,
    messages: StringTable,
    renderer: StringTable,
}

// =============================================================================
// en-US
// =============================================================================

const EN_US_MESSAGES: StringTable = &[
    ("audit.http-status-code.title", "Page has successful HTTP status code"),
    ("audit.http-status-code.failureTitle", "Page has unsuccessful HTTP status code"),
    (
        "audit.http-status-code.description",
        "Pages with unsuccessful HTTP status codes may not be indexed properly.",
    ),
    ("audit.is-on-https.title", "Uses HTTPS"),
    ("audit.is-on-https.failureTitle", "Does not use HTTPS"),
    (
        "audit.is-on-https.description",
        "All sites should be protected with HTTPS, even ones that don't handle sensitive data.",
    ),
    ("audit.redirects.title", "Avoids multiple page redirects"),
    ("audit.redirects.failureTitle", "Avoid multiple page redirects"),
    (
        "audit.redirects.description",
        "Redirects introduce additional delays before the page can be loaded.",
    ),
    ("audit.server-response-time.title", "Initial server response time was short"),
    ("audit.server-response-time.failureTitle", "Reduce initial server response time"),
    (
        "audit.server-response-time.description",
        "Keep the server response time for the main document short because all other requests depend on it.",
    ),
    ("audit.total-byte-weight.title", "Avoids enormous network payloads"),
    ("audit.total-byte-weight.failureTitle", "Avoid enormous network payloads"),
    (
        "audit.total-byte-weight.description",
        "Large network payloads cost users real money and are highly correlated with long load times.",
    ),
    ("audit.uses-text-compression.title", "Text compression is enabled"),
    ("audit.uses-text-compression.failureTitle", "Enable text compression"),
    (
        "audit.uses-text-compression.description",
        "Text-based resources should be served with compression (gzip, deflate or brotli) to minimize total network bytes.",
    ),
    ("category.performance.title", "Performance"),
    (
        "category.performance.description",
        "These checks measure how quickly the page is delivered.",
    ),
    ("category.best-practices.title", "Best Practices"),
    ("group.load-opportunities.title", "Opportunities"),
    (
        "group.load-opportunities.description",
        "These suggestions can help your page load faster.",
    ),
    ("group.diagnostics.title", "Diagnostics"),
    ("group.trust-and-safety.title", "Trust and Safety"),
    ("group.general.title", "General"),
];

const EN_US_RENDERER: StringTable = &[
    ("reportTitle", "Lighthouse Report"),
    ("passedAuditsGroupTitle", "Passed audits"),
    ("failedAuditsGroupTitle", "Failed audits"),
    ("notApplicableAuditsGroupTitle", "Not applicable"),
    ("errorLabel", "Error!"),
    ("warningHeader", "Warnings: "),
    (
        "toplevelWarningsMessage",
        "There were issues affecting this run of Lighthouse:",
    ),
    ("runtimeSettingsUrl", "URL"),
    ("runtimeSettingsFetchTime", "Fetch Time"),
    ("runtimeSettingsDevice", "Device"),
];

// =============================================================================
// es
// =============================================================================

const ES_MESSAGES: StringTable = &[
    ("audit.http-status-code.title", "La página tiene un código de estado HTTP correcto"),
    ("audit.http-status-code.failureTitle", "La página tiene un código de estado HTTP de error"),
    (
        "audit.http-status-code.description",
        "Es posible que las páginas con códigos de estado HTTP de error no se indexen correctamente.",
    ),
    ("audit.is-on-https.title", "Usa HTTPS"),
    ("audit.is-on-https.failureTitle", "No usa HTTPS"),
    (
        "audit.is-on-https.description",
        "Todos los sitios deben protegerse con HTTPS, incluso los que no gestionan datos sensibles.",
    ),
    ("audit.redirects.title", "Evita varias redirecciones de página"),
    ("audit.redirects.failureTitle", "Evita varias redirecciones de página"),
    (
        "audit.redirects.description",
        "Las redirecciones provocan retrasos adicionales antes de que se pueda cargar la página.",
    ),
    ("audit.server-response-time.title", "El tiempo de respuesta inicial del servidor fue breve"),
    ("audit.server-response-time.failureTitle", "Reduce el tiempo de respuesta inicial del servidor"),
    ("audit.total-byte-weight.title", "Evita cargas de red de gran tamaño"),
    ("audit.total-byte-weight.failureTitle", "Evita cargas de red de gran tamaño"),
    ("audit.uses-text-compression.title", "La compresión de texto está habilitada"),
    ("audit.uses-text-compression.failureTitle", "Habilita la compresión de texto"),
    ("category.performance.title", "Rendimiento"),
    ("category.best-practices.title", "Prácticas recomendadas"),
    ("group.load-opportunities.title", "Oportunidades"),
    ("group.diagnostics.title", "Diagnóstico"),
    ("group.trust-and-safety.title", "Confianza y seguridad"),
    ("group.general.title", "General"),
];

const ES_RENDERER: StringTable = &[
    ("reportTitle", "Informe de Lighthouse"),
    ("passedAuditsGroupTitle", "Auditorías aprobadas"),
    ("failedAuditsGroupTitle", "Auditorías no aprobadas"),
    ("notApplicableAuditsGroupTitle", "No aplicable"),
    ("errorLabel", "¡Error!"),
    ("warningHeader", "Advertencias: "),
    (
        "toplevelWarningsMessage",
        "Se produjeron errores que afectaron a la ejecución de Lighthouse:",
    ),
    ("runtimeSettingsFetchTime", "Hora de obtención"),
    ("runtimeSettingsDevice", "Dispositivo"),
];

const LOCALES: &[Locale] = &[
    Locale {
        code: DEFAULT_LOCALE,
        messages: EN_US_MESSAGES,
        renderer: EN_US_RENDERER,
    },
    Locale {
        code: "es",
        messages: ES_MESSAGES,
        renderer: ES_RENDERER,
    },
];

// =============================================================================
// LOOKUP
// =============================================================================

/// Locale codes with a string table.
pub fn available_locales() -> impl Iterator<Item = &'static str> {
    LOCALES.iter().map(|locale| locale.code)
}

fn language(code: &str) -> &str {
    code.split(['-', '_']).next().unwrap_or(code)
}

fn default_locale() -> &'static Locale {
    &LOCALES[0]
}

fn resolve(requested: &str) -> &'static Locale {
    LOCALES
        .iter()
        .find(|locale| locale.code.eq_ignore_ascii_case(requested))
        .or_else(|| {
            LOCALES
                .iter()
                .find(|locale| language(locale.code).eq_ignore_ascii_case(language(requested)))
        })
        .unwrap_or_else(|| {
            tracing::debug!(locale = requested, "no strings for locale, using {}", DEFAULT_LOCALE);
            default_locale()
        })
}

fn find(table: StringTable, id: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, message)| *message)
}

/// The locale code actually used for `requested`.
pub fn resolve_locale(requested: &str) -> &'static str {
    resolve(requested).code
}

/// A message in `locale`, falling back to the default locale.
pub fn message(locale: &str, id: &str) -> Option<&'static str> {
    find(resolve(locale).messages, id).or_else(|| find(default_locale().messages, id))
}

// =============================================================================
// LOCALIZER
// =============================================================================

/// Localizer backed by the built-in string tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringTableLocalizer;

impl Localizer for StringTableLocalizer {
    fn formatted_strings(&self, locale: &str) -> BTreeMap<String, String> {
        let mut strings: BTreeMap<String, String> = default_locale()
            .renderer
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        for (key, value) in resolve(locale).renderer {
            strings.insert(key.to_string(), value.to_string());
        }
        strings
    }

    fn replace_placeholders(
        &self,
        record: &mut ReportRecord,
        locale: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, LighthouseError> {
        let mut paths: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut missing: Vec<String> = Vec::new();

        record.for_each_message_mut(&mut |path, text| {
            let Some(id) = text.strip_prefix(PLACEHOLDER_PREFIX) else {
                return;
            };
            match message(locale, id) {
                Some(localized) => {
                    paths
                        .entry(id.to_string())
                        .or_default()
                        .push(path.to_string());
                    *text = localized.to_string();
                }
                None => missing.push(id.to_string()),
            }
        });

        if !missing.is_empty() {
            return Err(LighthouseError::Localization(format!(
                "No message for {} in locale {}",
                missing.join(", "),
                locale
            )));
        }
        Ok(paths)
    }
}

// =============================================================================
// TESTS
// =============================================================================
