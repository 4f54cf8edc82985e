//! # PortScope 🔭
//!
//! Herramienta de diagnóstico para Linux que muestra, para cada proceso,
//! los puertos TCP en los que está escuchando. Es parecida a `lsof -i`
//! pero limitada a sockets TCP en escucha (IPv4 e IPv6).
//!
//! ## Características
//! - Lectura directa de `/proc` (sin depender de `ss` ni `lsof`)
//! - Pipeline de etapas concurrentes conectadas por canales
//! - Agrupación de puertos por proceso o una fila por puerto
//! - Filtro por expresión regular y alias sobre la línea de comandos
//! - Orden por PID, puerto o comando
//! - Salida limpia (tabuladores) o tabla alineada con colores
//!
//! ## Uso
//! ```text
//! portscope            # tabla con PID y puertos
//! portscope -c -s      # con línea de comandos, ordenado por puerto
//! portscope -a -g java # alias, solo procesos java
//! portscope -b -t      # una línea por puerto, separada por tabuladores
//! ```

mod alias;
mod cli;
mod error;
mod port_scanner;
mod process;
mod render;
mod tcp_table;

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use crate::cli::{Cli, OutputMode};
use crate::error::{ErrorReporter, ScanError};
use crate::render::FormatOptions;

/// Inicializa el logging hacia stderr.
///
/// Por defecto solo se ven advertencias (errores por proceso y el aviso
/// de permisos); `-v` o `RUST_LOG=debug` muestran el detalle por etapa.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

/// Ejecuta el escaneo completo y escribe el resultado en stdout.
///
/// # Returns
/// Cantidad de filas emitidas, o el error fatal que detuvo la ejecución.
fn run(cli: Cli) -> Result<usize, ScanError> {
    let config = cli.into_config()?;
    let reporter = Arc::new(ErrorReporter::new());

    let records = port_scanner::scan_open_ports(&config, &reporter)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let rows = match config.output {
        OutputMode::Bare => render::emit_bare(records, &mut out)?,
        OutputMode::Formatted { color } => {
            let options = FormatOptions {
                show_command: config.load_commands,
                color,
            };
            render::emit_formatted(records, &mut out, options)?
        }
    };
    out.flush()?;

    Ok(rows)
}

/// Punto de entrada principal de PortScope.
fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::debug!("PortScope v{} iniciando...", env!("CARGO_PKG_VERSION"));

    match run(cli) {
        Ok(rows) => {
            log::debug!("{} filas emitidas", rows);
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}
