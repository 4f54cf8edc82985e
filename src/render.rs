/// Módulo de salida por terminal.
///
/// Dos formatos excluyentes que consumen el canal final del pipeline:
/// - **Bare**: una línea por registro separada por tabuladores, apta
///   para `cut`/`awk`.
/// - **Formateado**: tabla alineada con encabezado subrayado y colores
///   xterm (PID en 15, puertos en 58, comando en el color del alias).
use std::io::{self, Write};
use std::sync::mpsc::Receiver;

use owo_colors::{OwoColorize, Style, XtermColors};

use crate::port_scanner::PortRecord;

/// Color xterm de la columna PID
const PID_COLOR: u8 = 15;
/// Color xterm de la columna de puertos
const PORTS_COLOR: u8 = 58;
/// Ancho mínimo de columna
const MIN_WIDTH: usize = 4;
/// Espacios entre columnas
const PADDING: usize = 2;

/// Escribe cada registro como `pid\tpuertos\t\tcomando\n`.
///
/// # Returns
/// Cantidad de filas escritas.
pub fn emit_bare<W: Write>(input: Receiver<PortRecord>, out: &mut W) -> io::Result<usize> {
    let mut rows = 0;
    for record in input {
        write!(out, "{}\t{}\t\t", record.pid, record.ports_or_port())?;
        out.write_all(&record.cmd)?;
        out.write_all(b"\n")?;
        rows += 1;
    }
    Ok(rows)
}

/// Opciones de la tabla formateada.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Agrega el encabezado de la columna de comando
    pub show_command: bool,
    /// Emite secuencias de color ANSI
    pub color: bool,
}

/// Fila ya convertida a texto, antes de aplicar estilos.
struct Row {
    pid: String,
    ports: String,
    cmd: String,
    cmd_color: u8,
}

/// Escribe una tabla alineada con encabezado.
///
/// La alineación se calcula sobre el texto plano y los estilos se
/// aplican después, para que las secuencias ANSI no alteren el ancho.
///
/// # Returns
/// Cantidad de filas de datos escritas (sin contar el encabezado).
pub fn emit_formatted<W: Write>(
    input: Receiver<PortRecord>,
    out: &mut W,
    options: FormatOptions,
) -> io::Result<usize> {
    let rows: Vec<Row> = input
        .into_iter()
        .map(|record| Row {
            ports: record.ports_or_port(),
            cmd: String::from_utf8_lossy(&record.cmd).into_owned(),
            pid: record.pid,
            cmd_color: record.cmd_color,
        })
        .collect();

    let pid_width = column_width("pid", rows.iter().map(|r| r.pid.as_str()));
    let ports_width = column_width("port", rows.iter().map(|r| r.ports.as_str()));

    // Sin comandos la columna de puertos es la última y no lleva relleno
    let ports_width = if options.show_command { ports_width } else { 0 };

    let header = Style::new().underline();
    write_cell(out, "pid", Some(header), pid_width, options.color)?;
    write_cell(out, "port", Some(header), ports_width, options.color)?;
    if options.show_command {
        write_cell(out, "command", Some(header), 0, options.color)?;
    }
    writeln!(out)?;

    for row in &rows {
        write_cell(out, &row.pid, Some(xterm(PID_COLOR)), pid_width, options.color)?;
        write_cell(out, &row.ports, Some(xterm(PORTS_COLOR)), ports_width, options.color)?;
        if options.show_command {
            let cmd_style = (row.cmd_color > 0).then(|| xterm(row.cmd_color));
            write_cell(out, &row.cmd, cmd_style, 0, options.color)?;
        }
        writeln!(out)?;
    }

    Ok(rows.len())
}

fn xterm(code: u8) -> Style {
    Style::new().color(XtermColors::from(code))
}

/// Ancho de una columna: el texto más largo más el relleno.
fn column_width<'a>(header: &str, cells: impl Iterator<Item = &'a str>) -> usize {
    let widest = cells
        .map(|c| c.chars().count())
        .chain(std::iter::once(header.chars().count()))
        .max()
        .unwrap_or(0);
    widest.max(MIN_WIDTH) + PADDING
}

/// Escribe una celda con estilo opcional, rellenando hasta `width`.
///
/// Con `width` 0 (última columna) no se agrega relleno.
fn write_cell<W: Write>(
    out: &mut W,
    text: &str,
    style: Option<Style>,
    width: usize,
    color: bool,
) -> io::Result<()> {
    match style {
        Some(style) if color => write!(out, "{}", text.style(style))?,
        _ => out.write_all(text.as_bytes())?,
    }
    let fill = width.saturating_sub(text.chars().count());
    write!(out, "{:fill$}", "")
}
