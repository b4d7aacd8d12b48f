//! I/O for vector feature collections

mod geojson;

pub use geojson::{from_geojson_str, read_geojson, to_geojson_string, write_geojson};
