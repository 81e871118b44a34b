mod overpass;

pub use overpass::{OverpassConfig, OverpassSource};

use crate::{
    error::FetchError,
    types::{Feature, RoadGraph},
};

use geo::Coord;

/// Provider of map data around a point. `center` is `(lon, lat)` in degrees.
pub trait MapDataSource {
    fn fetch_road_graph(&self, center: Coord<f64>, radius_m: f64) -> Result<RoadGraph, FetchError>;

    fn fetch_features(&self, center: Coord<f64>, radius_m: f64) -> Result<Vec<Feature>, FetchError>;
}

impl<T: MapDataSource + ?Sized> MapDataSource for &T {
    fn fetch_road_graph(&self, center: Coord<f64>, radius_m: f64) -> Result<RoadGraph, FetchError> {
        (**self).fetch_road_graph(center, radius_m)
    }

    fn fetch_features(&self, center: Coord<f64>, radius_m: f64) -> Result<Vec<Feature>, FetchError> {
        (**self).fetch_features(center, radius_m)
    }
}
