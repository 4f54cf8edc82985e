/// Módulo de escaneo de puertos en escucha.
///
/// Correlaciona procesos y sockets TCP en escucha mediante un pipeline
/// de etapas concurrentes. Cada etapa corre en su propio hilo, consume
/// un canal de entrada y produce un canal de salida; cuando su entrada
/// se cierra y se vacía, suelta su `Sender` y así cierra la siguiente.
///
/// ```text
/// find_pids → get_sockets → map_ports → [gather] → [map_commands → grep]
///           → [map_aliases] → [sort_records] → render
/// ```
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use procfs::process::Process;
use regex::bytes::Regex;

use crate::alias::{self, Alias};
use crate::cli::ScanConfig;
use crate::error::{ErrorReporter, ScanError};
use crate::process;
use crate::tcp_table::ListeningSocketTable;

/// Capacidad del canal de salida del filtro `grep` (el único acotado).
pub const GREP_QUEUE_CAPACITY: usize = 12;

/// Unidad que fluye por el pipeline: un socket en escucha de un proceso.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortRecord {
    /// PID del proceso (solo dígitos)
    pub pid: String,
    /// Inodo del socket, fijado por `get_sockets`
    pub inode: String,
    /// Puerto representativo (el menor tras agrupar)
    pub port: u16,
    /// Lista de puertos separada por comas, llenada por `gather`
    pub ports: String,
    /// Línea de comandos con los NUL convertidos en espacios
    pub cmd: Vec<u8>,
    /// Color xterm asignado por un alias (0 = sin color)
    pub cmd_color: u8,
}

impl PortRecord {
    pub fn new(pid: &str, inode: String) -> Self {
        Self {
            pid: pid.to_string(),
            inode,
            ..Default::default()
        }
    }

    /// Texto de la columna de puertos: la lista agrupada o, si no se
    /// agrupó, el puerto individual.
    pub fn ports_or_port(&self) -> String {
        if self.ports.is_empty() {
            self.port.to_string()
        } else {
            self.ports.clone()
        }
    }
}

/// Criterio de orden de la salida.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Pid,
    Port,
    Command,
}

impl TryFrom<u8> for SortKey {
    type Error = ScanError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(SortKey::Pid),
            1 => Ok(SortKey::Port),
            2 => Ok(SortKey::Command),
            other => Err(ScanError::InvalidSortKey(other)),
        }
    }
}

/// Arma el pipeline completo según la configuración.
///
/// La tabla de sockets en escucha y el directorio de procesos se leen
/// antes de lanzar cualquier hilo, de modo que un error fatal no deja
/// etapas a medio arrancar ni produce filas.
///
/// # Returns
/// El canal final del pipeline, listo para el renderizador.
pub fn scan_open_ports(
    config: &ScanConfig,
    reporter: &Arc<ErrorReporter>,
) -> Result<Receiver<PortRecord>, ScanError> {
    let table = Arc::new(ListeningSocketTable::from_proc(&config.proc_root)?);
    let processes = find_pids(&config.proc_root, Arc::clone(reporter))?;

    let sockets = get_sockets(Arc::clone(reporter), processes);
    let mut pipe = map_ports(table, sockets);

    if config.group_by_pid {
        pipe = gather(pipe);
    }

    if let Some(pattern) = &config.grep {
        let commands = map_commands(config.proc_root.clone(), Arc::clone(reporter), pipe);
        pipe = grep(pattern.clone(), commands);
    } else if config.load_commands {
        pipe = map_commands(config.proc_root.clone(), Arc::clone(reporter), pipe);
    }

    if let Some(aliases) = &config.aliases {
        pipe = map_aliases(aliases.clone(), pipe);
    }

    if let Some(key) = config.sort {
        pipe = sort_records(key, pipe);
    }

    Ok(pipe)
}

// ─────────────────────────────────────────────────────────────
// Etapas de origen: procesos y sockets
// ─────────────────────────────────────────────────────────────

/// Emite los procesos presentes en el directorio de procesos.
///
/// Abrir el directorio es fatal si falla; un proceso que no se puede
/// abrir (terminó, permisos) se reporta y se sigue con los demás.
pub fn find_pids(
    proc_root: &Path,
    reporter: Arc<ErrorReporter>,
) -> Result<Receiver<Process>, ScanError> {
    let processes = process::all_processes(proc_root)?;
    let root = proc_root.to_path_buf();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let mut found = 0usize;
        for proc in processes {
            let proc = match proc {
                Ok(proc) => proc,
                Err(err) => {
                    reporter.report_proc(&err);
                    continue;
                }
            };
            if tx.send(proc).is_err() {
                return;
            }
            found += 1;
        }
        log::debug!("{} procesos en {}", found, root.display());
    });

    Ok(rx)
}

/// Emite un registro `{pid, inode}` por cada descriptor de socket.
///
/// Un proceso cuyo directorio `fd/` no se puede leer no aporta registros;
/// el error se reporta y el escaneo sigue con el próximo proceso.
pub fn get_sockets(
    reporter: Arc<ErrorReporter>,
    input: Receiver<Process>,
) -> Receiver<PortRecord> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        for proc in input {
            let inodes = match process::socket_inodes(&proc) {
                Ok(inodes) => inodes,
                Err(err) => {
                    reporter.report_proc(&err);
                    continue;
                }
            };
            let pid = proc.pid().to_string();
            for inode in inodes {
                if tx.send(PortRecord::new(&pid, inode)).is_err() {
                    return;
                }
            }
        }
    });

    rx
}

// ─────────────────────────────────────────────────────────────
// Etapas de transformación (una entrada → cero o una salida)
// ─────────────────────────────────────────────────────────────

/// Lanza una etapa que aplica `step` a cada elemento de `input`.
///
/// Los elementos para los que `step` devuelve `None` se descartan.
fn spawn_stage<F>(
    name: &'static str,
    input: Receiver<PortRecord>,
    mut step: F,
) -> Receiver<PortRecord>
where
    F: FnMut(PortRecord) -> Option<PortRecord> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (mut emitted, mut dropped) = (0usize, 0usize);
        for record in input {
            match step(record) {
                Some(record) => {
                    if tx.send(record).is_err() {
                        return;
                    }
                    emitted += 1;
                }
                None => dropped += 1,
            }
        }
        log::debug!("Etapa {name}: {emitted} emitidos, {dropped} descartados");
    });

    rx
}

/// Asigna el puerto a cada registro cuyo inodo está en escucha.
///
/// Los registros con inodos ajenos a la tabla (conexiones salientes,
/// sockets unix, UDP) se descartan. Un puerto hexadecimal inválido
/// queda como 0 en lugar de descartar el registro.
pub fn map_ports(
    table: Arc<ListeningSocketTable>,
    input: Receiver<PortRecord>,
) -> Receiver<PortRecord> {
    spawn_stage("puertos", input, move |mut record| {
        let hex = table.get(&record.inode)?;
        record.port = parse_hex_port(hex);
        Some(record)
    })
}

fn parse_hex_port(hex: &str) -> u16 {
    u16::from_str_radix(hex, 16).unwrap_or(0)
}

/// Carga la línea de comandos de cada registro.
///
/// Si no se puede leer (el proceso terminó, permisos) el comando queda
/// vacío y el registro sigue su camino igualmente.
pub fn map_commands(
    proc_root: PathBuf,
    reporter: Arc<ErrorReporter>,
    input: Receiver<PortRecord>,
) -> Receiver<PortRecord> {
    spawn_stage("comandos", input, move |mut record| {
        match process::read_cmdline(&proc_root, &record.pid) {
            Ok(cmd) => record.cmd = cmd,
            Err(err) => {
                reporter.report(&process::cmdline_path(&proc_root, &record.pid), &err);
                record.cmd.clear();
            }
        }
        Some(record)
    })
}

/// Descarta los registros cuyo comando no coincide con `pattern`.
///
/// Es la única etapa con canal acotado: con la cola llena bloquea a la
/// etapa anterior hasta que el consumidor avance.
pub fn grep(pattern: Regex, input: Receiver<PortRecord>) -> Receiver<PortRecord> {
    let (tx, rx) = mpsc::sync_channel(GREP_QUEUE_CAPACITY);

    thread::spawn(move || {
        for record in input {
            if pattern.is_match(&record.cmd) && tx.send(record).is_err() {
                return;
            }
        }
    });

    rx
}

/// Reemplaza el comando de cada registro según los alias.
pub fn map_aliases(aliases: Vec<Alias>, input: Receiver<PortRecord>) -> Receiver<PortRecord> {
    spawn_stage("alias", input, move |mut record| {
        alias::apply_aliases(&aliases, &mut record);
        Some(record)
    })
}

// ─────────────────────────────────────────────────────────────
// Etapas barrera: leen toda la entrada antes de emitir
// ─────────────────────────────────────────────────────────────

/// Agrupa los registros por PID, uno por proceso.
///
/// El primer registro de un PID inicia el grupo con `ports` igual a su
/// puerto. Los siguientes se fusionan así: un puerto mayor que el
/// representativo se agrega al final de la lista; uno menor o igual
/// pasa a ser el representativo y se agrega al principio. Por eso
/// `port` siempre es el mínimo visto, pero la lista solo queda ordenada
/// si los puertos llegan en un orden favorable.
///
/// Los grupos se emiten en el orden en que apareció cada PID.
pub fn gather(input: Receiver<PortRecord>) -> Receiver<PortRecord> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let mut groups: Vec<PortRecord> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for mut record in input {
            match index.get(&record.pid).copied() {
                Some(slot) => merge_port(&mut groups[slot], record.port),
                None => {
                    record.ports = record.port.to_string();
                    index.insert(record.pid.clone(), groups.len());
                    groups.push(record);
                }
            }
        }

        log::debug!("Etapa agrupar: {} procesos", groups.len());
        for group in groups {
            if tx.send(group).is_err() {
                return;
            }
        }
    });

    rx
}

fn merge_port(group: &mut PortRecord, port: u16) {
    if port > group.port {
        group.ports = format!("{},{}", group.ports, port);
    } else {
        group.port = port;
        group.ports = format!("{},{}", port, group.ports);
    }
}

/// Ordena todos los registros de forma ascendente según `key`.
///
/// El orden es estable: los registros con la misma clave conservan el
/// orden de llegada y ninguno se pierde. Los PIDs se comparan como
/// números y los comandos byte a byte.
pub fn sort_records(key: SortKey, input: Receiver<PortRecord>) -> Receiver<PortRecord> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let mut records: Vec<PortRecord> = input.into_iter().collect();
        match key {
            SortKey::Pid => records.sort_by_key(|r| r.pid.parse::<u64>().unwrap_or(0)),
            SortKey::Port => records.sort_by_key(|r| r.port),
            SortKey::Command => records.sort_by(|a, b| a.cmd.cmp(&b.cmd)),
        }

        for record in records {
            if tx.send(record).is_err() {
                return;
            }
        }
    });

    rx
}
