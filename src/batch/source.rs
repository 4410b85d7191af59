use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use super::types::{not_available, unknown_id, untitled, ProjectInput};
use crate::scoring::FactorKey;

const ID_COLUMNS: &[&str] = &["id", "id_proyecto"];
const NAME_COLUMNS: &[&str] = &["name", "nombre_proyecto"];
const AREA_COLUMNS: &[&str] = &["area", "area_negocio"];
const SPONSOR_COLUMNS: &[&str] = &["sponsor", "sponsor_ejecutivo"];

/// Column names accepted for each factor, English first.
fn factor_columns(key: FactorKey) -> &'static [&'static str] {
    match key {
        FactorKey::Roi => &["roi", "metric_roi_0_100"],
        FactorKey::Urgency => &["urgency", "metric_urgencia_0_100"],
        FactorKey::Risk => &["risk", "metric_riesgo_0_100"],
        FactorKey::StrategicAlignment => &["strategic_alignment", "metric_alineacion_0_100"],
        FactorKey::ResourceAvailability => &["resource_availability", "metric_recursos_0_100"],
    }
}

/// Load batch input, picking the format from the file extension
/// (`.csv`, `.json`, `.yaml`/`.yml`).
pub fn load_projects(path: &Path) -> Result<Vec<ProjectInput>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let projects = match extension.as_str() {
        "csv" => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            read_csv(file).with_context(|| format!("Failed to read CSV from {}", path.display()))?
        }
        "json" => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse project list in {}", path.display()))?
        }
        "yaml" | "yml" => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_saphyr::from_str(&content)
                .with_context(|| format!("Failed to parse project list in {}", path.display()))?
        }
        other => anyhow::bail!(
            "Unsupported project file '{}': expected .csv, .json, .yaml or .yml (got '{}')",
            path.display(),
            other
        ),
    };

    debug!(path = %path.display(), count = projects.len(), "loaded projects");
    Ok(projects)
}

/// Normalize a header: trim, lowercase, spaces and dashes to underscores.
pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Read projects from CSV. A factor cell that is empty or not a number is
/// left out, so scoring reports the project as missing that factor.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<ProjectInput>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .map(normalize_header)
        .collect();

    let column = |names: &[&str]| names.iter().find_map(|n| headers.iter().position(|h| h == n));
    let id_col = column(ID_COLUMNS);
    let name_col = column(NAME_COLUMNS);
    let area_col = column(AREA_COLUMNS);
    let sponsor_col = column(SPONSOR_COLUMNS);
    let factor_cols: Vec<(FactorKey, usize)> = FactorKey::ALL
        .iter()
        .filter_map(|key| column(factor_columns(*key)).map(|col| (*key, col)))
        .collect();

    let mut projects = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("Invalid CSV record at row {}", row + 1))?;
        let cell = |col: Option<usize>| {
            col.and_then(|c| record.get(c))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let mut factors = BTreeMap::new();
        for (key, col) in &factor_cols {
            let raw = record.get(*col).unwrap_or_default();
            match raw.parse::<f64>() {
                Ok(value) => {
                    factors.insert(key.as_str().to_string(), value);
                }
                Err(_) => {
                    warn!(
                        row = row + 1,
                        factor = key.as_str(),
                        value = raw,
                        "unreadable factor cell"
                    );
                }
            }
        }

        projects.push(ProjectInput {
            id: cell(id_col).unwrap_or_else(unknown_id),
            name: cell(name_col).unwrap_or_else(untitled),
            area: cell(area_col).unwrap_or_else(not_available),
            sponsor: cell(sponsor_col).unwrap_or_else(not_available),
            factors,
        });
    }

    Ok(projects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" Metric ROI 0-100 "), "metric_roi_0_100");
        assert_eq!(normalize_header("Strategic-Alignment"), "strategic_alignment");
    }

    #[test]
    fn test_read_csv_english_headers() {
        let data = "id,name,area,sponsor,roi,urgency,risk,\
                    strategic_alignment,resource_availability\n\
                    P-1, Cloud Migration ,IT,CIO,90,80,20,70,60\n";
        let projects = read_csv(data.as_bytes()).unwrap();
        assert_eq!(projects.len(), 1);
        let p = &projects[0];
        assert_eq!(p.id, "P-1");
        assert_eq!(p.name, "Cloud Migration");
        assert_eq!(p.factors.len(), 5);
        assert_eq!(p.factors["roi"], 90.0);
        assert_eq!(p.factors["resource_availability"], 60.0);
    }

    #[test]
    fn test_read_csv_spanish_headers() {
        let data = "ID Proyecto,Nombre Proyecto,Area Negocio,Sponsor Ejecutivo,\
                    Metric ROI 0-100,Metric Urgencia 0-100,Metric Riesgo 0-100,\
                    Metric Alineacion 0-100,Metric Recursos 0-100\n\
                    PRJ-7,ERP,Finanzas,CFO,75.5,60,40,80,50\n";
        let projects = read_csv(data.as_bytes()).unwrap();
        let p = &projects[0];
        assert_eq!(p.id, "PRJ-7");
        assert_eq!(p.area, "Finanzas");
        assert_eq!(p.sponsor, "CFO");
        assert_eq!(p.factors["roi"], 75.5);
        assert_eq!(p.factors["strategic_alignment"], 80.0);
    }

    #[test]
    fn test_missing_identity_columns_default() {
        let data = "roi,urgency\n10,20\n";
        let projects = read_csv(data.as_bytes()).unwrap();
        let p = &projects[0];
        assert_eq!(p.id, "Unknown");
        assert_eq!(p.name, "Untitled");
        assert_eq!(p.area, "N/A");
        assert_eq!(p.sponsor, "N/A");
        assert_eq!(p.factors.len(), 2);
    }

    #[test]
    fn test_bad_factor_cell_left_absent() {
        let data = "id,roi,urgency\nP-1,n/a,50\nP-2,,60\n";
        let projects = read_csv(data.as_bytes()).unwrap();
        assert!(!projects[0].factors.contains_key("roi"));
        assert_eq!(projects[0].factors["urgency"], 50.0);
        assert!(!projects[1].factors.contains_key("roi"));
    }

    #[test]
    fn test_load_projects_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("projects.json");
        std::fs::write(
            &json_path,
            r#"[{"id": "J-1", "name": "Portal", "factors": {"roi": 50}}]"#,
        )
        .unwrap();
        let projects = load_projects(&json_path).unwrap();
        assert_eq!(projects[0].id, "J-1");
        assert_eq!(projects[0].area, "N/A");

        let yaml_path = dir.path().join("projects.yaml");
        let mut file = std::fs::File::create(&yaml_path).unwrap();
        writeln!(
            file,
            "- id: Y-1\n  name: Data Lake\n  area: Analytics\n  sponsor: CDO\n  \
             factors:\n    roi: 70\n    risk: 30"
        )
        .unwrap();
        let projects = load_projects(&yaml_path).unwrap();
        assert_eq!(projects[0].id, "Y-1");
        assert_eq!(projects[0].factors["risk"], 30.0);

        let csv_path = dir.path().join("projects.CSV");
        std::fs::write(&csv_path, "id,roi\nC-1,5\n").unwrap();
        assert_eq!(load_projects(&csv_path).unwrap()[0].id, "C-1");
    }

    #[test]
    fn test_load_projects_rejects_spreadsheets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projects.xlsx");
        std::fs::write(&path, b"PK").unwrap();
        let err = load_projects(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported project file"));
    }
}
