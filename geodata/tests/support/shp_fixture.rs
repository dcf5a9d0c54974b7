//! Écriture de Shapefiles de points minimaux (.shp, .shx, .dbf) pour les tests
//!
//! Les octets sont écrits à la main: en-tête de 100 octets, enregistrements
//! `Point` (type 1) ou `NullShape` (type 0), DBF dBase III.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

const SHAPE_POINT: i32 = 1;
const SHAPE_NULL: i32 = 0;

/// Champ DBF: `kind` vaut `b'C'` (texte) ou `b'N'` (numérique sans décimale)
pub struct DbfField {
    pub name: &'static str,
    pub kind: u8,
    pub length: u8,
}

pub const POI_FIELDS: [DbfField; 3] = [
    DbfField {
        name: "NAME",
        kind: b'C',
        length: 24,
    },
    DbfField {
        name: "TYPE",
        kind: b'C',
        length: 16,
    },
    DbfField {
        name: "RANK",
        kind: b'N',
        length: 4,
    },
];

pub const WGS84_PRJ: &str = r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563,AUTHORITY["EPSG","7030"]],AUTHORITY["EPSG","6326"]],PRIMEM["Greenwich",0,AUTHORITY["EPSG","8901"]],UNIT["degree",0.0174532925199433,AUTHORITY["EPSG","9122"]],AUTHORITY["EPSG","4326"]]"#;

pub const LAMBERT93_PRJ: &str = r#"PROJCS["RGF93 / Lambert-93",GEOGCS["RGF93",DATUM["Reseau_Geodesique_Francais_1993",SPHEROID["GRS 1980",6378137,298.257222101,AUTHORITY["EPSG","7019"]],AUTHORITY["EPSG","6171"]],AUTHORITY["EPSG","4171"]],PROJECTION["Lambert_Conformal_Conic_2SP"],UNIT["metre",1,AUTHORITY["EPSG","9001"]],AUTHORITY["EPSG","2154"]]"#;

/// Écrit `<stem>.shp`, `<stem>.shx` et `<stem>.dbf`, retourne le chemin du `.shp`
///
/// `points[i]` à `None` produit un `NullShape`; `rows[i]` donne les valeurs
/// des champs dans l'ordre de `fields`.
pub fn write_point_shapefile(
    dir: &Path,
    stem: &str,
    points: &[Option<(f64, f64)>],
    fields: &[DbfField],
    rows: &[Vec<&str>],
) -> PathBuf {
    assert_eq!(points.len(), rows.len(), "one DBF row per shape");

    let mut records = Vec::new();
    let mut index = Vec::new();
    let mut offset_words: i32 = 50;

    for (i, point) in points.iter().enumerate() {
        let mut body = Vec::new();
        match point {
            Some((x, y)) => {
                body.extend_from_slice(&SHAPE_POINT.to_le_bytes());
                body.extend_from_slice(&x.to_le_bytes());
                body.extend_from_slice(&y.to_le_bytes());
            }
            None => body.extend_from_slice(&SHAPE_NULL.to_le_bytes()),
        }
        let content_words = (body.len() / 2) as i32;

        records.extend_from_slice(&(i as i32 + 1).to_be_bytes());
        records.extend_from_slice(&content_words.to_be_bytes());
        records.extend_from_slice(&body);

        index.extend_from_slice(&offset_words.to_be_bytes());
        index.extend_from_slice(&content_words.to_be_bytes());
        offset_words += 4 + content_words;
    }

    let bbox = bounding_box(points);

    let mut shp = main_header(((100 + records.len()) / 2) as i32, bbox);
    shp.extend_from_slice(&records);

    let mut shx = main_header(((100 + index.len()) / 2) as i32, bbox);
    shx.extend_from_slice(&index);

    let shp_path = dir.join(format!("{stem}.shp"));
    fs::write(&shp_path, shp).unwrap();
    fs::write(dir.join(format!("{stem}.shx")), shx).unwrap();
    fs::write(dir.join(format!("{stem}.dbf")), dbf(fields, rows)).unwrap();
    shp_path
}

fn bounding_box(points: &[Option<(f64, f64)>]) -> [f64; 4] {
    let mut coords = points.iter().flatten();
    let Some(&(x, y)) = coords.next() else {
        return [0.0; 4];
    };
    coords.fold([x, y, x, y], |[xmin, ymin, xmax, ymax], &(x, y)| {
        [xmin.min(x), ymin.min(y), xmax.max(x), ymax.max(y)]
    })
}

fn main_header(file_length_words: i32, bbox: [f64; 4]) -> Vec<u8> {
    let mut header = Vec::with_capacity(100);
    header.extend_from_slice(&9994i32.to_be_bytes());
    header.extend_from_slice(&[0u8; 20]);
    header.extend_from_slice(&file_length_words.to_be_bytes());
    header.extend_from_slice(&1000i32.to_le_bytes());
    header.extend_from_slice(&SHAPE_POINT.to_le_bytes());
    for value in bbox {
        header.extend_from_slice(&value.to_le_bytes());
    }
    // Z et M non utilisés
    header.extend_from_slice(&[0u8; 32]);
    header
}

fn dbf(fields: &[DbfField], rows: &[Vec<&str>]) -> Vec<u8> {
    let header_length = 32 + 32 * fields.len() + 1;
    let record_length = 1 + fields.iter().map(|f| usize::from(f.length)).sum::<usize>();

    let mut out = Vec::new();
    out.push(0x03);
    // 2024-01-01
    out.extend_from_slice(&[124, 1, 1]);
    out.extend_from_slice(&(rows.len() as u32).to_le_bytes());
    out.extend_from_slice(&(header_length as u16).to_le_bytes());
    out.extend_from_slice(&(record_length as u16).to_le_bytes());
    out.extend_from_slice(&[0u8; 20]);

    for field in fields {
        let mut name = [0u8; 11];
        name[..field.name.len()].copy_from_slice(field.name.as_bytes());
        out.extend_from_slice(&name);
        out.push(field.kind);
        out.extend_from_slice(&[0u8; 4]);
        out.push(field.length);
        out.push(0);
        out.extend_from_slice(&[0u8; 14]);
    }
    out.push(0x0D);

    for row in rows {
        out.push(b' ');
        for (field, value) in fields.iter().zip(row) {
            let width = usize::from(field.length);
            assert!(value.len() <= width, "value too long for {}", field.name);
            let padded = if field.kind == b'N' {
                format!("{value:>width$}")
            } else {
                format!("{value:<width$}")
            };
            out.extend_from_slice(padded.as_bytes());
        }
    }
    out.push(0x1A);
    out
}
