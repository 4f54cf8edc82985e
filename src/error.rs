/// Módulo de errores y política de reporte de diagnósticos.
///
/// PortScope distingue tres clases de error:
/// - **Fatal**: no se puede leer `/proc` o una tabla de conexiones.
///   Se aborta antes de arrancar el pipeline, sin emitir filas.
/// - **Permiso**: un directorio o archivo de un proceso es inaccesible
///   por falta de privilegios. Se avisa una sola vez por ejecución.
/// - **Transitorio**: cualquier otro fallo de E/S de un proceso (por
///   ejemplo, el proceso terminó durante el escaneo). Se avisa siempre.
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;

use nix::errno::Errno;
use nix::unistd::Uid;
use procfs::ProcError;
use thiserror::Error;

/// Errores fatales que detienen la ejecución completa.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no se puede leer el directorio de procesos {path}: {source}")]
    ProcRoot { path: PathBuf, source: ProcError },

    #[error("no se puede leer la tabla de conexiones {path}: {source}")]
    ConnectionTable { path: PathBuf, source: io::Error },

    #[error("expresión regular inválida: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("clave de orden inválida: {0} (use 0=pid, 1=puerto, 2=comando)")]
    InvalidSortKey(u8),

    #[error("error escribiendo la salida: {0}")]
    Output(#[from] io::Error),
}

/// Reporta los errores por proceso al flujo de diagnóstico (stderr).
///
/// Se crea una sola vez al construir el pipeline y se comparte con
/// `Arc` entre todas las etapas que hacen E/S. El aviso de permisos
/// usa un guard `Once`: aunque varios hilos lo disparen a la vez,
/// se imprime como máximo una vez.
#[derive(Debug)]
pub struct ErrorReporter {
    permission_warning: Once,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self {
            permission_warning: Once::new(),
        }
    }

    /// Reporta un error de E/S ocurrido al leer `path`.
    ///
    /// Los errores de permisos se avisan una sola vez; el resto se
    /// registra en cada ocurrencia, sin deduplicar.
    pub fn report(&self, path: &Path, err: &io::Error) {
        if is_permission_denied(err) {
            self.warn_permission();
        } else {
            log::warn!("Error leyendo {}: {}", path.display(), err);
        }
    }

    /// Reporta un error devuelto por `procfs` al inspeccionar un proceso.
    ///
    /// `PermissionDenied` (o un `Io` con errno de permisos) cae en el
    /// aviso único; `NotFound` y el resto son transitorios.
    pub fn report_proc(&self, err: &ProcError) {
        match err {
            ProcError::PermissionDenied(_) => self.warn_permission(),
            ProcError::Io(io_err, _) if is_permission_denied(io_err) => self.warn_permission(),
            other => log::warn!("Error inspeccionando proceso: {other}"),
        }
    }

    fn warn_permission(&self) {
        self.permission_warning.call_once(|| {
            if Uid::effective().is_root() {
                log::warn!("Permiso denegado leyendo procesos, incluso como root.");
            } else {
                log::warn!("Permiso denegado, intente ejecutar como root.");
            }
        });
    }

    #[cfg(test)]
    fn permission_warned(&self) -> bool {
        self.permission_warning.is_completed()
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Determina si un error de E/S corresponde a falta de privilegios.
///
/// Además del `ErrorKind`, revisa el errno crudo (`EACCES`/`EPERM`)
/// porque algunos pseudo-archivos de `/proc` devuelven `EPERM`.
pub fn is_permission_denied(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }
    matches!(
        err.raw_os_error().map(Errno::from_raw),
        Some(Errno::EACCES | Errno::EPERM)
    )
}
