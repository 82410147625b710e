//! Multi-markdown tables.
//!
//! Tables are found line by line and replaced by a single-line `<table>`
//! HTML block, so the CommonMark parser passes them through untouched.
//! Supported on top of GFM tables: several header rows, headerless tables,
//! multiple bodies separated by one blank line, rows continued with a
//! trailing `\`, rowspan with `^^` and colspan with an empty `||` segment.

use regex::Regex;
use std::fmt::Write;
use std::sync::LazyLock;

static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\|?\s*:?-+:?\s*(?:\|\s*:?-+:?\s*)*\|?$").expect("SEPARATOR_RE should compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    None,
    Left,
    Center,
    Right,
}

impl Align {
    fn class(self) -> Option<&'static str> {
        match self {
            Align::None => None,
            Align::Left => Some("align-left"),
            Align::Center => Some("align-center"),
            Align::Right => Some("align-right"),
        }
    }
}

#[derive(Debug, Clone)]
struct Cell {
    content: String,
    col: usize,
    colspan: usize,
    rowspan: usize,
    merged: bool,
}

#[derive(Debug)]
struct Row {
    cells: Vec<Cell>,
    continues: bool,
}

fn is_separator(line: &str) -> bool {
    let line = line.trim();
    line.contains('|') && SEPARATOR_RE.is_match(line)
}

fn is_row(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.contains('|') && !is_separator(line)
}

fn parse_alignments(separator: &str) -> Vec<Align> {
    let line = separator.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|')
        .map(|spec| {
            let spec = spec.trim();
            match (spec.starts_with(':'), spec.ends_with(':')) {
                (true, true) => Align::Center,
                (false, true) => Align::Right,
                (true, false) => Align::Left,
                (false, false) => Align::None,
            }
        })
        .collect()
}

/// Split on unescaped pipes; `\|` stays a literal pipe.
fn split_segments(line: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => segments.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    segments.push(current);
    segments
}

fn parse_row(line: &str) -> Row {
    let mut line = line.trim();
    let mut continues = false;
    if let Some(rest) = line.strip_suffix('\\') {
        if rest.trim_end().ends_with('|') {
            continues = true;
            line = rest.trim_end();
        }
    }
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = match line.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => line,
    };

    let mut cells: Vec<Cell> = Vec::new();
    let mut col = 0;
    for (i, segment) in split_segments(line).into_iter().enumerate() {
        if segment.is_empty() && i > 0 {
            if let Some(last) = cells.last_mut() {
                last.colspan += 1;
                col += 1;
                continue;
            }
        }
        cells.push(Cell {
            content: segment.trim().to_owned(),
            col,
            colspan: 1,
            rowspan: 1,
            merged: false,
        });
        col += 1;
    }

    Row { cells, continues }
}

/// Read one logical row starting at `start`, folding `\` continuations.
fn read_row(lines: &[&str], start: usize) -> (Row, usize) {
    let mut row = parse_row(lines[start]);
    let mut next = start + 1;
    while row.continues && next < lines.len() && is_row(lines[next]) {
        let more = parse_row(lines[next]);
        for (i, cell) in more.cells.into_iter().enumerate() {
            match row.cells.get_mut(i) {
                Some(existing) if existing.content.is_empty() => existing.content = cell.content,
                Some(existing) => {
                    if !cell.content.is_empty() {
                        existing.content.push('\n');
                        existing.content.push_str(&cell.content);
                    }
                }
                None => row.cells.push(cell),
            }
        }
        row.continues = more.continues;
        next += 1;
    }
    (row, next)
}

/// Resolve `^^` cells of one section into rowspans of the cells above.
fn apply_rowspans(rows: &mut [Row]) {
    // (row, cell) of the last real cell seen in each column
    let mut owners: Vec<Option<(usize, usize)>> = Vec::new();
    for r in 0..rows.len() {
        for c in 0..rows[r].cells.len() {
            let col = rows[r].cells[c].col;
            if owners.len() <= col {
                owners.resize(col + 1, None);
            }
            if rows[r].cells[c].content == "^^" {
                if let Some((or, oc)) = owners[col] {
                    rows[or].cells[oc].rowspan += 1;
                    rows[r].cells[c].merged = true;
                    continue;
                }
            }
            owners[col] = Some((r, c));
        }
    }
}

struct Table {
    aligns: Vec<Align>,
    header: Vec<Row>,
    bodies: Vec<Vec<Row>>,
}

/// Try to read a table whose first line is `start`. Returns the table and
/// the index of the first line after it.
fn parse_table(lines: &[&str], start: usize) -> Option<(Table, usize)> {
    let mut sep = start;
    while sep < lines.len() && is_row(lines[sep]) {
        sep += 1;
    }
    if sep >= lines.len() || !is_separator(lines[sep]) {
        return None;
    }

    let mut header = Vec::new();
    let mut i = start;
    while i < sep {
        let (row, next) = read_row(&lines[..sep], i);
        header.push(row);
        i = next;
    }

    let mut bodies: Vec<Vec<Row>> = Vec::new();
    let mut body: Vec<Row> = Vec::new();
    let mut i = sep + 1;
    while i < lines.len() {
        if is_row(lines[i]) {
            let (row, next) = read_row(lines, i);
            body.push(row);
            i = next;
        } else if lines[i].trim().is_empty()
            && !body.is_empty()
            && i + 1 < lines.len()
            && is_row(lines[i + 1])
            && !(i + 2 < lines.len() && is_separator(lines[i + 2]))
        {
            bodies.push(std::mem::take(&mut body));
            i += 1;
        } else {
            break;
        }
    }
    if !body.is_empty() {
        bodies.push(body);
    }

    if header.is_empty() && bodies.is_empty() {
        return None;
    }

    apply_rowspans(&mut header);
    for body in &mut bodies {
        apply_rowspans(body);
    }

    Some((
        Table {
            aligns: parse_alignments(lines[sep]),
            header,
            bodies,
        },
        i,
    ))
}

fn write_row(out: &mut String, row: &Row, tag: &str, aligns: &[Align], render: &dyn Fn(&str) -> String) {
    out.push_str("<tr>");
    for cell in row.cells.iter().filter(|cell| !cell.merged) {
        let _ = write!(out, "<{tag}");
        if let Some(class) = aligns.get(cell.col).copied().and_then(Align::class) {
            let _ = write!(out, r#" class="{class}""#);
        }
        if cell.colspan > 1 {
            let _ = write!(out, r#" colspan="{}""#, cell.colspan);
        }
        if cell.rowspan > 1 {
            let _ = write!(out, r#" rowspan="{}""#, cell.rowspan);
        }
        // keep the block on one line, &#10; is still a newline inside <pre>
        let html = render(&cell.content);
        let _ = write!(out, ">{}</{tag}>", html.trim_end().replace('\n', "&#10;"));
    }
    out.push_str("</tr>");
}

fn write_table(table: &Table, render: &dyn Fn(&str) -> String) -> String {
    let mut out = String::from("<table>");
    if !table.header.is_empty() {
        out.push_str("<thead>");
        for row in &table.header {
            write_row(&mut out, row, "th", &table.aligns, render);
        }
        out.push_str("</thead>");
    }
    for body in &table.bodies {
        out.push_str("<tbody>");
        for row in body {
            write_row(&mut out, row, "td", &table.aligns, render);
        }
        out.push_str("</tbody>");
    }
    out.push_str("</table>");
    out
}

/// Replace every table in `src` with HTML. `render_cell` turns the text of
/// one cell into inline HTML.
pub fn convert_tables(src: &str, render_cell: &dyn Fn(&str) -> String) -> String {
    if !src.contains('|') {
        return src.to_owned();
    }

    let lines: Vec<&str> = src.split('\n').collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let starts_block = i == 0 || lines[i - 1].trim().is_empty() || !is_row(lines[i - 1]);
        if starts_block && (is_row(lines[i]) || is_separator(lines[i])) {
            if let Some((table, next)) = parse_table(&lines, i) {
                // blank lines around the block so it never merges with a paragraph
                if out.last().is_some_and(|l| !l.trim().is_empty()) {
                    out.push(String::new());
                }
                out.push(write_table(&table, render_cell));
                out.push(String::new());
                i = next;
                continue;
            }
        }
        out.push(lines[i].to_owned());
        i += 1;
    }
    out.join("\n")
}
