/// Módulo de alias de visualización.
///
/// Un alias reemplaza la línea de comandos de un proceso por un texto
/// más corto (por ejemplo `/usr/bin/redis-server *:6379` → `redis-server`)
/// y le asigna un color xterm para la tabla formateada.
use regex::bytes::Regex;

use crate::port_scanner::PortRecord;

/// Alias predefinidos: (patrón, plantilla, color xterm).
///
/// Se evalúan en orden y el último que coincide es el que se aplica.
const DEFAULT_ALIASES: &[(&str, &str, u8)] = &[
    ("java.*webstorm", "webstorm", 51),
    (r"^/usr/bin/([\w_\-\.]+)\s.*", "@1", 48),
    (r"^/usr/sbin/([\w_\-\.]+)\s.*", "@1", 46),
];

/// Regla de alias: patrón, plantilla con referencias `@N` y color.
#[derive(Debug, Clone)]
pub struct Alias {
    pattern: Regex,
    template: String,
    color: u8,
}

impl Alias {
    pub fn new(pattern: &str, template: &str, color: u8) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            template: template.to_string(),
            color,
        })
    }

    pub fn color(&self) -> u8 {
        self.color
    }

    /// Calcula el texto a mostrar si el patrón coincide con `cmd`.
    ///
    /// Cada `@N` de la plantilla se sustituye por el grupo de captura N
    /// (`@0` es la coincidencia completa; un grupo sin coincidencia
    /// queda vacío). Se sustituye del índice mayor al menor para que
    /// `@1` no pise el prefijo de `@10`.
    ///
    /// # Returns
    /// `None` si el patrón no coincide.
    pub fn expand(&self, cmd: &[u8]) -> Option<Vec<u8>> {
        let captures = self.pattern.captures(cmd)?;
        let mut display = self.template.clone();
        for index in (0..captures.len()).rev() {
            let group = captures
                .get(index)
                .map(|m| String::from_utf8_lossy(m.as_bytes()))
                .unwrap_or_default();
            display = display.replace(&format!("@{index}"), &group);
        }
        Some(display.into_bytes())
    }
}

/// Compila el conjunto de alias predefinidos.
pub fn default_aliases() -> Result<Vec<Alias>, regex::Error> {
    DEFAULT_ALIASES
        .iter()
        .map(|(pattern, template, color)| Alias::new(pattern, template, *color))
        .collect()
}

/// Aplica los alias a un registro, en orden de declaración.
///
/// Cada regla se evalúa contra el comando tal como lo dejó la regla
/// anterior; si varias coinciden, la última sobrescribe el texto y el
/// color de las anteriores.
pub fn apply_aliases(aliases: &[Alias], record: &mut PortRecord) {
    for alias in aliases {
        if let Some(display) = alias.expand(&record.cmd) {
            record.cmd = display;
            record.cmd_color = alias.color();
        }
    }
}
