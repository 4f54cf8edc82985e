/// Módulo de la tabla de sockets TCP en escucha.
///
/// Lee `/proc/net/tcp` y `/proc/net/tcp6` y construye un mapa
/// inodo → puerto (en hexadecimal, tal como aparece en la tabla del
/// kernel). La tabla se construye antes de arrancar el pipeline y es
/// de solo lectura a partir de ahí.
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::ScanError;

/// Código de estado TCP_LISTEN en las tablas de `/proc/net`.
pub const TCP_LISTEN: &str = "0A";

/// Posición de la dirección local (`ADDR:PUERTO`, en hex).
const LOCAL_ADDRESS_FIELD: usize = 1;
/// Posición del estado de la conexión.
const STATE_FIELD: usize = 3;
/// Posición del inodo del socket.
const INODE_FIELD: usize = 9;

/// Mapa inodo → puerto hexadecimal de los sockets en escucha.
///
/// Si dos filas declaran el mismo inodo, gana la primera que se leyó
/// (IPv4 se parsea antes que IPv6).
#[derive(Debug, Default, Clone)]
pub struct ListeningSocketTable {
    ports: HashMap<String, String>,
}

impl ListeningSocketTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construye la tabla a partir de `<proc_root>/net/tcp` y `<proc_root>/net/tcp6`.
    ///
    /// # Returns
    /// Error fatal si alguno de los dos archivos no se puede abrir.
    pub fn from_proc(proc_root: &Path) -> Result<Self, ScanError> {
        let mut table = Self::new();
        table.load(&proc_root.join("net").join("tcp"))?;
        table.load(&proc_root.join("net").join("tcp6"))?;
        if table.is_empty() {
            log::info!("No hay sockets TCP en escucha en {}", proc_root.display());
        } else {
            log::debug!("{} sockets TCP en escucha", table.len());
        }
        Ok(table)
    }

    /// Agrega a la tabla los sockets en escucha de un archivo.
    pub fn load(&mut self, path: &Path) -> Result<usize, ScanError> {
        let content = fs::read_to_string(path).map_err(|source| ScanError::ConnectionTable {
            path: path.to_path_buf(),
            source,
        })?;
        let added = self.parse(&content);
        log::debug!("{}: {} sockets en escucha nuevos", path.display(), added);
        Ok(added)
    }

    /// Parsea el contenido de una tabla de conexiones.
    ///
    /// La primera línea es el encabezado y la última el resto vacío tras
    /// el salto de línea final; ambas se descartan. Las líneas mal
    /// formadas se ignoran en silencio.
    ///
    /// # Returns
    /// Cantidad de inodos nuevos agregados.
    pub fn parse(&mut self, content: &str) -> usize {
        let lines: Vec<&str> = content.split('\n').collect();
        if lines.len() < 2 {
            return 0;
        }

        let mut added = 0;
        for line in &lines[1..lines.len() - 1] {
            let Some((inode, port)) = parse_single_line(line) else {
                continue;
            };
            if !self.ports.contains_key(inode) {
                self.ports.insert(inode.to_string(), port.to_string());
                added += 1;
            }
        }
        added
    }

    /// Puerto hexadecimal asociado a un inodo, si está en escucha.
    pub fn get(&self, inode: &str) -> Option<&str> {
        self.ports.get(inode).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// Parsea una fila de la tabla y devuelve `(inodo, puerto_hex)`.
///
/// Formato de una fila de `/proc/net/tcp`:
/// ```text
///   0: 00000000:18EB 00000000:0000 0A 00000000:00000000 00:00000000 00000000   999        0 21620 1 ...
/// ```
/// Solo se aceptan filas en estado `0A` (LISTEN).
fn parse_single_line(line: &str) -> Option<(&str, &str)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() <= INODE_FIELD {
        return None;
    }
    if fields[STATE_FIELD] != TCP_LISTEN {
        return None;
    }

    // El puerto es lo que sigue al último ':' (IPv6 no usa ':' en la dirección hex)
    let (_, port) = fields[LOCAL_ADDRESS_FIELD].rsplit_once(':')?;
    Some((fields[INODE_FIELD], port))
}
