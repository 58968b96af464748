use crate::model::RenderOptions;

/// A single value of a result row, independent of the engine that produced it.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Cell {
    pub fn display(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Integer(i) => i.to_string(),
            Cell::Real(r) => r.to_string(),
            Cell::Text(s) => s.clone(),
            Cell::Blob(b) => hex::encode(b),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Cell::Integer(_) | Cell::Real(_))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: vec![] }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }
}

/// Render a result set as text. A set with no columns renders as nothing.
pub fn render(rs: &ResultSet, opts: RenderOptions) -> String {
    if rs.columns.is_empty() {
        return String::new();
    }

    let mut text: Vec<Vec<String>> = rs
        .rows
        .iter()
        .map(|row| row.iter().map(Cell::display).collect())
        .collect();

    if opts.merge_cells {
        // Compare against the original values so a run of three equal cells
        // keeps only the first one.
        for r in (1..text.len()).rev() {
            for c in 0..rs.columns.len() {
                let above = rs.rows[r - 1].get(c);
                if above.is_some() && above == rs.rows[r].get(c) {
                    text[r][c] = String::new();
                }
            }
        }
    }

    if !opts.render_as_table {
        return render_plain(&rs.columns, &text);
    }

    let mut widths: Vec<usize> = rs.columns.iter().map(|h| h.chars().count()).collect();
    for row in &text {
        for (c, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(c) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let border = border_line(&widths);
    let mut out = String::new();
    out.push_str(&border);

    let header: Vec<(&str, bool)> = rs.columns.iter().map(|h| (h.as_str(), false)).collect();
    out.push_str(&row_line(&header, &widths));
    out.push_str(&border);

    for (r, row) in text.iter().enumerate() {
        let cells: Vec<(&str, bool)> = row
            .iter()
            .enumerate()
            .map(|(c, s)| (s.as_str(), rs.rows[r].get(c).is_some_and(Cell::is_numeric)))
            .collect();
        out.push_str(&row_line(&cells, &widths));
        if opts.row_separator && r + 1 < text.len() {
            out.push_str(&border);
        }
    }
    if !text.is_empty() {
        out.push_str(&border);
    }
    out
}

fn border_line(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for w in widths {
        line.push_str(&"-".repeat(w + 2));
        line.push('+');
    }
    line.push('\n');
    line
}

fn row_line(cells: &[(&str, bool)], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (c, width) in widths.iter().enumerate() {
        let (value, right) = cells.get(c).copied().unwrap_or(("", false));
        let pad = width.saturating_sub(value.chars().count());
        line.push(' ');
        if right {
            line.extend(std::iter::repeat(' ').take(pad));
            line.push_str(value);
        } else {
            line.push_str(value);
            line.extend(std::iter::repeat(' ').take(pad));
        }
        line.push_str(" |");
    }
    line.push('\n');
    line
}

fn render_plain(columns: &[String], text: &[Vec<String>]) -> String {
    let mut out = columns.join("\t");
    out.push('\n');
    for row in text {
        out.push_str(&row.join("\t"));
        out.push('\n');
    }
    out
}
