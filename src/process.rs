/// Acceso a los procesos a través del crate `procfs`.
///
/// Cada proceso es un directorio `<proc_root>/<pid>/` con `fd/` (un
/// enlace por descriptor abierto) y `cmdline` (argumentos separados
/// por bytes NUL).
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use procfs::process::{all_processes_with_root, FDTarget, Process, ProcessesIter};
use procfs::ProcResult;

use crate::error::ScanError;

/// Abre el directorio raíz de procesos y devuelve el iterador de procesos.
///
/// Un fallo aquí es fatal: sin `/proc` no hay nada que escanear. Las
/// entradas que no son PIDs (`self`, `net`, ...) las descarta `procfs`.
pub fn all_processes(proc_root: &Path) -> Result<ProcessesIter, ScanError> {
    all_processes_with_root(proc_root).map_err(|source| ScanError::ProcRoot {
        path: proc_root.to_path_buf(),
        source,
    })
}

/// Lista los inodos de socket de los descriptores de un proceso.
///
/// Los descriptores que no se pueden resolver (se cerraron entre la
/// lectura de `fd/` y el `readlink`) se ignoran.
///
/// # Returns
/// Error si el directorio `fd/` no se puede abrir; en ese caso el
/// proceso no aporta ningún socket.
pub fn socket_inodes(process: &Process) -> ProcResult<Vec<String>> {
    let inodes = process
        .fd()?
        .filter_map(Result::ok)
        .filter_map(|fd| match fd.target {
            FDTarget::Socket(inode) => Some(inode.to_string()),
            _ => None,
        })
        .collect();
    Ok(inodes)
}

pub fn cmdline_path(proc_root: &Path, pid: &str) -> PathBuf {
    proc_root.join(pid).join("cmdline")
}

/// Lee la línea de comandos de un proceso, con los NUL convertidos en espacios.
///
/// Se lee en bytes crudos porque `Process::cmdline()` parte los
/// argumentos en `String`s y no conserva bytes que no sean UTF-8.
pub fn read_cmdline(proc_root: &Path, pid: &str) -> io::Result<Vec<u8>> {
    let mut cmd = fs::read(cmdline_path(proc_root, pid))?;
    for byte in cmd.iter_mut().filter(|b| **b == 0) {
        *byte = b' ';
    }
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    /// Solo los directorios numéricos cuentan como procesos
    #[test]
    fn test_all_processes_skips_non_numeric() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("1446").join("fd")).unwrap();
        fs::create_dir_all(dir.path().join("1").join("fd")).unwrap();
        fs::create_dir_all(dir.path().join("self")).unwrap();
        fs::create_dir_all(dir.path().join("net")).unwrap();

        let mut pids: Vec<i32> = all_processes(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|p| p.pid())
            .collect();
        pids.sort();
        assert_eq!(pids, vec![1, 1446]);
    }

    /// Solo los descriptores que apuntan a sockets producen inodos
    #[test]
    fn test_socket_inodes_from_fd_dir() {
        let dir = tempfile::tempdir().unwrap();
        let fd = dir.path().join("1446").join("fd");
        fs::create_dir_all(&fd).unwrap();
        symlink("/dev/null", fd.join("0")).unwrap();
        symlink("socket:[21620]", fd.join("3")).unwrap();
        symlink("socket:[21621]", fd.join("4")).unwrap();
        symlink("pipe:[999]", fd.join("5")).unwrap();

        let process = Process::new_with_root(dir.path().join("1446")).unwrap();
        let mut inodes = socket_inodes(&process).unwrap();
        inodes.sort();
        assert_eq!(inodes, vec!["21620", "21621"]);
    }

    /// Un proceso sin directorio fd/ devuelve error
    #[test]
    fn test_socket_inodes_without_fd_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("999")).unwrap();
        let process = Process::new_with_root(dir.path().join("999")).unwrap();
        assert!(socket_inodes(&process).is_err());
    }

    /// Los separadores NUL se reemplazan por espacios
    #[test]
    fn test_read_cmdline_replaces_nul() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("1446")).unwrap();
        fs::write(
            dir.path().join("1446").join("cmdline"),
            b"/usr/bin/redis-server\0*:6379\0",
        )
        .unwrap();

        let cmd = read_cmdline(dir.path(), "1446").unwrap();
        assert_eq!(cmd, b"/usr/bin/redis-server *:6379 ".to_vec());
    }

    /// La raíz de procesos inexistente es un error fatal
    #[test]
    fn test_all_processes_missing_root() {
        let err = all_processes(Path::new("/nonexistent/proc")).unwrap_err();
        assert!(matches!(err, ScanError::ProcRoot { .. }));
    }
}
