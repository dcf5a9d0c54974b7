//! Reprojection de géométries vers WGS84 avec PROJ
//!
//! La transformation effective n'est disponible qu'avec le feature `reproject`.

use crate::crs::Crs;
use crate::GeoDataError;

#[cfg(feature = "reproject")]
use geo::{Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
#[cfg(feature = "reproject")]
use proj::Proj;

/// Reprojection d'un CRS source vers EPSG:4326
#[cfg(feature = "reproject")]
pub struct Reprojector {
    proj: Proj,
    source: Crs,
}

#[cfg(feature = "reproject")]
impl Reprojector {
    /// Crée un reprojector depuis le CRS source
    pub fn new(source: &Crs) -> Result<Self, GeoDataError> {
        let target = format!("EPSG:{}", crate::crs::WGS84_EPSG);
        // new_known_crs normalise l'ordre des axes en lon/lat
        let proj = Proj::new_known_crs(&source.definition(), &target, None)
            .map_err(|e| GeoDataError::reprojection(source, e.to_string()))?;

        Ok(Self {
            proj,
            source: source.clone(),
        })
    }

    /// Transforme une géométrie
    pub fn transform_geometry(&self, geom: &Geometry<f64>) -> Result<Geometry<f64>, GeoDataError> {
        match geom {
            Geometry::Point(p) => Ok(Geometry::Point(self.transform_point(p)?)),
            Geometry::Line(l) => {
                let ls = self.transform_linestring(&LineString::new(vec![l.start, l.end]))?;
                Ok(Geometry::LineString(ls))
            }
            Geometry::LineString(ls) => Ok(Geometry::LineString(self.transform_linestring(ls)?)),
            Geometry::Polygon(p) => Ok(Geometry::Polygon(self.transform_polygon(p)?)),
            Geometry::MultiPoint(mp) => {
                let points: Result<Vec<Point>, _> =
                    mp.0.iter().map(|p| self.transform_point(p)).collect();
                Ok(Geometry::MultiPoint(MultiPoint::new(points?)))
            }
            Geometry::MultiLineString(mls) => {
                let lines: Result<Vec<LineString>, _> = mls
                    .0
                    .iter()
                    .map(|ls| self.transform_linestring(ls))
                    .collect();
                Ok(Geometry::MultiLineString(MultiLineString::new(lines?)))
            }
            Geometry::MultiPolygon(mp) => {
                let polys: Result<Vec<Polygon>, _> =
                    mp.0.iter().map(|p| self.transform_polygon(p)).collect();
                Ok(Geometry::MultiPolygon(MultiPolygon::new(polys?)))
            }
            Geometry::GeometryCollection(gc) => {
                let geoms: Result<Vec<Geometry>, _> =
                    gc.0.iter().map(|g| self.transform_geometry(g)).collect();
                Ok(Geometry::GeometryCollection(GeometryCollection::new_from(geoms?)))
            }
            Geometry::Rect(r) => Ok(Geometry::Polygon(self.transform_polygon(&r.to_polygon())?)),
            Geometry::Triangle(t) => {
                Ok(Geometry::Polygon(self.transform_polygon(&t.to_polygon())?))
            }
        }
    }

    fn transform_point(&self, p: &Point) -> Result<Point, GeoDataError> {
        let (x, y) = self
            .proj
            .convert((p.x(), p.y()))
            .map_err(|e| GeoDataError::reprojection(&self.source, e.to_string()))?;
        Ok(Point::new(x, y))
    }

    /// Transforme une LineString (conversion batch)
    fn transform_linestring(&self, ls: &LineString) -> Result<LineString, GeoDataError> {
        let mut coords: Vec<(f64, f64)> = ls.0.iter().map(|c| (c.x, c.y)).collect();

        self.proj
            .convert_array(&mut coords)
            .map_err(|e| GeoDataError::reprojection(&self.source, e.to_string()))?;

        Ok(LineString::new(
            coords.into_iter().map(|(x, y)| Coord { x, y }).collect(),
        ))
    }

    fn transform_polygon(&self, p: &Polygon) -> Result<Polygon, GeoDataError> {
        let exterior = self.transform_linestring(p.exterior())?;
        let interiors: Result<Vec<LineString>, _> = p
            .interiors()
            .iter()
            .map(|ls| self.transform_linestring(ls))
            .collect();
        Ok(Polygon::new(exterior, interiors?))
    }
}

/// Reprojector sans PROJ: seul le WGS84 est accepté
#[cfg(not(feature = "reproject"))]
pub struct Reprojector;

#[cfg(not(feature = "reproject"))]
impl Reprojector {
    /// Échoue toujours pour un CRS autre que WGS84
    pub fn new(source: &Crs) -> Result<Self, GeoDataError> {
        if source.is_wgs84() {
            Ok(Self)
        } else {
            Err(GeoDataError::reprojection(
                source,
                "reprojection requires the 'reproject' feature (cargo build --features reproject)",
            ))
        }
    }

    /// Retourne la géométrie inchangée
    pub fn transform_geometry(
        &self,
        geom: &geo::Geometry<f64>,
    ) -> Result<geo::Geometry<f64>, GeoDataError> {
        Ok(geom.clone())
    }
}
