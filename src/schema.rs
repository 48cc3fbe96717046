//! Maps loosely formatted roster headers onto the canonical `StudentRecord` shape.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;

use crate::config::EngineConfig;
use crate::error::SchemaError;
use crate::models::{ExtracurricularGrade, RecordWarning, StudentRecord};
use crate::score;

/// A roster exactly as uploaded: header row plus string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRoster {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRoster {
    pub records: Vec<StudentRecord>,
    pub warnings: Vec<RecordWarning>,
}

impl NormalizedRoster {
    /// Keeps only students whose class matches `class_name`, ignoring case and
    /// surrounding whitespace. Warnings are kept as they are.
    pub fn retain_class(&mut self, class_name: &str) {
        let wanted = normalize_header(class_name);
        self.records.retain(|record| {
            record
                .class_name
                .as_deref()
                .is_some_and(|class| normalize_header(class) == wanted)
        });
    }
}

impl From<Vec<StudentRecord>> for NormalizedRoster {
    fn from(records: Vec<StudentRecord>) -> Self {
        Self {
            records,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Field {
    Id,
    Name,
    Class,
    Extracurricular,
    Absences,
    Subject(&'static str),
}

/// Accepted header variants, in priority order within each field.
const SYNONYMS: &[(&str, Field)] = &[
    ("NIS", Field::Id),
    ("NISN", Field::Id),
    ("ID", Field::Id),
    ("NO INDUK", Field::Id),
    ("NAMA", Field::Name),
    ("NAMA SISWA", Field::Name),
    ("NAME", Field::Name),
    ("KELAS", Field::Class),
    ("CLASS", Field::Class),
    ("EKSTRA", Field::Extracurricular),
    ("EKSKUL", Field::Extracurricular),
    ("EXTRACURRICULAR", Field::Extracurricular),
    ("ALPA", Field::Absences),
    ("ALFA", Field::Absences),
    ("ABSEN", Field::Absences),
    ("MATEMATIKA", Field::Subject("MTK")),
    ("B.INDONESIA", Field::Subject("BINDO")),
    ("B. INDONESIA", Field::Subject("BINDO")),
    ("INDO", Field::Subject("BINDO")),
    ("B.INGGRIS", Field::Subject("BINGGRIS")),
    ("B. INGGRIS", Field::Subject("BINGGRIS")),
    ("INGGRIS", Field::Subject("BINGGRIS")),
];

pub fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Reads a CSV roster with a header row. Ragged rows are tolerated.
pub fn read_roster<R: Read>(reader: R) -> Result<RawRoster, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(RawRoster { headers, rows })
}

struct ColumnMap {
    id: Option<usize>,
    name: Option<usize>,
    class: Option<usize>,
    extracurricular: Option<usize>,
    absences: Option<usize>,
    subjects: Vec<(String, usize)>,
}

fn map_columns(headers: &[String], config: &EngineConfig) -> ColumnMap {
    let subject_set: HashSet<String> = config.subjects.iter().map(|s| normalize_header(s)).collect();
    let mut best: HashMap<Field, (usize, usize)> = HashMap::new();
    let mut subjects: BTreeMap<String, usize> = BTreeMap::new();

    for (column, header) in headers.iter().enumerate() {
        let key = normalize_header(header);
        if key.is_empty() || key.starts_with("UNNAMED") {
            continue;
        }

        let synonym = SYNONYMS
            .iter()
            .enumerate()
            .find(|(_, (variant, _))| *variant == key);

        match synonym {
            Some((_, (_, Field::Subject(code)))) => {
                if subject_set.contains(*code) {
                    subjects.entry(code.to_string()).or_insert(column);
                }
            }
            Some((priority, (_, field))) => {
                let entry = best.entry(*field).or_insert((priority, column));
                if priority < entry.0 {
                    *entry = (priority, column);
                }
            }
            None if subject_set.contains(&key) => {
                subjects.entry(key).or_insert(column);
            }
            None => {}
        }
    }

    // Keep configured subject order rather than alphabetical.
    let ordered = config
        .subjects
        .iter()
        .filter_map(|code| {
            let code = normalize_header(code);
            subjects.get(&code).map(|column| (code, *column))
        })
        .collect();

    let pick = |field: Field| best.get(&field).map(|(_, column)| *column);
    ColumnMap {
        id: pick(Field::Id),
        name: pick(Field::Name),
        class: pick(Field::Class),
        extracurricular: pick(Field::Extracurricular),
        absences: pick(Field::Absences),
        subjects: ordered,
    }
}

fn parse_absences(cell: &str) -> Option<u32> {
    let value = score::parse_score(cell)?;
    if value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Some(value as u32)
    } else {
        None
    }
}

fn cell(row: &[String], column: Option<usize>) -> Option<&str> {
    column
        .and_then(|c| row.get(c))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Produces canonical records. Fails only when no key column exists at all.
pub fn normalize(raw: &RawRoster, config: &EngineConfig) -> Result<NormalizedRoster, SchemaError> {
    if raw.headers.is_empty() {
        return Err(SchemaError::EmptyHeader);
    }

    let columns = map_columns(&raw.headers, config);
    if columns.id.is_none() && columns.name.is_none() {
        return Err(SchemaError::MissingKeyColumn {
            headers: raw.headers.clone(),
        });
    }

    let mut seen = HashSet::new();
    let mut roster = NormalizedRoster::default();

    for (index, row) in raw.rows.iter().enumerate() {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let id = cell(row, columns.id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("ROW-{}", index + 1));
        let name = cell(row, columns.name).map(str::to_string).unwrap_or_else(|| id.clone());

        if !seen.insert(id.clone()) {
            tracing::warn!(id = %id, row = index + 1, "duplicate student id dropped");
            roster.warnings.push(RecordWarning {
                id,
                name,
                reason: format!("duplicate id at row {}", index + 1),
            });
            continue;
        }

        let subject_scores = columns
            .subjects
            .iter()
            .filter_map(|(code, column)| {
                cell(row, Some(*column))
                    .and_then(score::parse_score)
                    .map(|value| (code.clone(), value))
            })
            .collect();

        roster.records.push(StudentRecord {
            id,
            name,
            class_name: cell(row, columns.class).map(str::to_string),
            subject_scores,
            extracurricular_grade: cell(row, columns.extracurricular)
                .map(ExtracurricularGrade::parse)
                .unwrap_or_default(),
            unexcused_absences: cell(row, columns.absences).and_then(parse_absences),
        });
    }

    Ok(roster)
}
