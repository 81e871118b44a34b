use crate::{error::PipelineError, types::CityRecord};

use std::{io::Read, path::Path};

use tracing::{Level, event};

pub const DEFAULT_DELIMITER: u8 = b';';

/// Reads the city table. Rows that cannot be decoded are logged and skipped.
pub fn read_cities(path: &Path, delimiter: u8) -> Result<Vec<CityRecord>, PipelineError> {
    if !path.is_file() {
        return Err(PipelineError::MissingInputFile(path.to_path_buf()));
    }

    let file = std::fs::File::open(path).map_err(|err| PipelineError::io(path, err))?;

    parse_cities(file, delimiter)
}

pub fn parse_cities(reader: impl Read, delimiter: u8) -> Result<Vec<CityRecord>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    // Fail early on an unreadable header row.
    reader.headers()?;

    let mut cities = Vec::new();

    for (index, row) in reader.deserialize::<CityRecord>().enumerate() {
        match row {
            Ok(city) => cities.push(city),
            Err(err) => event!(Level::WARN, "Skipping row {}: {}", index + 1, err),
        }
    }

    event!(Level::INFO, "Loaded {} cities", cities.len());

    Ok(cities)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_semicolon_table_with_source_headers() {
        let table = "uf;municipio;latitude;longitude\n\
                     SP;Example City;-23.55;-46.63\n\
                     RJ; Rio de Janeiro ;-22.9;-43.2\n";

        let cities = parse_cities(table.as_bytes(), DEFAULT_DELIMITER).unwrap();

        assert_eq!(cities.len(), 2);
        assert_eq!(cities[0], CityRecord::new("SP", "Example City", -23.55, -46.63));
        assert_eq!(cities[1].place_name, "Rio de Janeiro");
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let table = "region_code,place_name,latitude,longitude,population\n\
                     SP,Example City,-23.55,-46.63,100\n\
                     MG,Broken,north,west,1\n";

        let cities = parse_cities(table.as_bytes(), b',').unwrap();

        assert_eq!(cities.len(), 1);
        assert_eq!(cities[0].identity(), "Example_City_SP");
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let path = std::env::temp_dir().join("citymap-no-such-cities.csv");

        assert!(matches!(
            read_cities(&path, DEFAULT_DELIMITER),
            Err(PipelineError::MissingInputFile(_))
        ));
    }
}
