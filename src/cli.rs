/// Módulo de línea de comandos y configuración del escaneo.
use std::path::PathBuf;

use clap::Parser;
use regex::bytes::Regex;

use crate::alias::{self, Alias};
use crate::error::ScanError;
use crate::port_scanner::SortKey;

/// Raíz por defecto del sistema de archivos de procesos
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// 🔭 PortScope - Muestra qué puertos TCP escucha cada proceso.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "portscope")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Muestra la línea de comandos de cada proceso
    #[arg(short = 'c', long)]
    pub command: bool,

    /// Salida limpia separada por tabuladores, sin colores
    #[arg(short = 'b', long)]
    pub bare: bool,

    /// Ordena la salida: 0=pid, 1=puerto (por defecto si se omite el valor), 2=comando
    #[arg(
        short = 's',
        long,
        value_name = "N",
        num_args = 0..=1,
        default_missing_value = "1",
        value_parser = clap::value_parser!(u8).range(0..=2)
    )]
    pub sort: Option<u8>,

    /// Muestra alias en lugar del comando completo
    #[arg(short = 'a', long)]
    pub aliases: bool,

    /// Filtra por expresión regular sobre la línea de comandos
    #[arg(short = 'g', long, value_name = "PATTERN")]
    pub grep: Option<String>,

    /// Una fila por puerto en lugar de agrupar por proceso
    #[arg(short = 't', long)]
    pub table: bool,

    /// Raíz del sistema de archivos de procesos
    #[arg(long, env = "PORTSCOPE_PROC_ROOT", default_value = DEFAULT_PROC_ROOT)]
    pub proc_root: PathBuf,

    /// Desactiva los colores de la tabla formateada
    #[arg(long)]
    pub no_color: bool,

    /// Logging detallado (equivale a RUST_LOG=debug)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Forma de la salida final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Líneas separadas por tabuladores
    Bare,
    /// Tabla alineada con encabezado, opcionalmente con colores
    Formatted { color: bool },
}

/// Configuración validada de una ejecución.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub proc_root: PathBuf,
    pub load_commands: bool,
    pub aliases: Option<Vec<Alias>>,
    pub grep: Option<Regex>,
    pub group_by_pid: bool,
    pub sort: Option<SortKey>,
    pub output: OutputMode,
}

impl ScanConfig {
    /// Configuración por defecto: agrupar por PID, sin comandos, tabla con colores.
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            load_commands: false,
            aliases: None,
            grep: None,
            group_by_pid: true,
            sort: None,
            output: OutputMode::Formatted { color: true },
        }
    }
}

impl Cli {
    /// Valida los argumentos y resuelve sus implicaciones.
    ///
    /// `--grep` y `--aliases` implican cargar la línea de comandos.
    /// Una expresión regular inválida es un error fatal.
    pub fn into_config(self) -> Result<ScanConfig, ScanError> {
        let mut config = ScanConfig::new(self.proc_root);

        config.grep = self.grep.as_deref().map(Regex::new).transpose()?;
        if self.aliases {
            config.aliases = Some(alias::default_aliases()?);
        }
        config.load_commands = self.command || self.aliases || config.grep.is_some();
        config.group_by_pid = !self.table;
        config.sort = self.sort.map(SortKey::try_from).transpose()?;
        config.output = if self.bare {
            OutputMode::Bare
        } else {
            OutputMode::Formatted {
                color: !self.no_color,
            }
        };

        Ok(config)
    }
}
