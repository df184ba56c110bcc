//! Surface preparation and hillshade rendering through the GDAL command-line
//! tools.
//!
//! `gdalwarp` clips the global elevation model to a footprint and reprojects
//! the clip to a sinusoidal grid centred on the footprint; `gdaldem` renders
//! the hillshade. Outputs are GeoTIFFs in a working directory and are read
//! back with the `tiff` crate.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;
use tracing::debug;

use super::raster::{Raster, RoiMask};
use super::renderer::{ShadingRenderer, SunGeometry};
use super::surface::{Footprint, PreparedSurface, SurfaceProvider};
use crate::error::ShadingError;

/// Mean lunar radius in metres.
pub const LUNAR_RADIUS_M: f64 = 1_737_400.0;

pub fn lunar_longlat_srs() -> String {
    format!("+proj=longlat +a={LUNAR_RADIUS_M} +b={LUNAR_RADIUS_M} +no_defs")
}

pub fn lunar_sinusoidal_srs(center_lon: f64) -> String {
    format!(
        "+proj=sinu +lon_0={center_lon} +x_0=0 +y_0=0 +a={LUNAR_RADIUS_M} +b={LUNAR_RADIUS_M} +no_defs"
    )
}

/// File name of a hillshade rendered for `identifier`.
pub fn hillshade_file_name(identifier: &str, sun: &SunGeometry, zfactor: f64) -> String {
    format!(
        "{identifier}_hillshade_az{:.2}_inc{:.2}_z{zfactor:.2}.tif",
        sun.azimuth, sun.incidence
    )
}

/// Clips and reprojects a global DEM with `gdalwarp`.
#[derive(Debug, Clone)]
pub struct GdalSurfaceProvider {
    pub dem: PathBuf,
    pub workdir: PathBuf,
    pub nodata: f64,
    pub gdalwarp: PathBuf,
}

impl GdalSurfaceProvider {
    pub fn new(dem: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            dem: dem.into(),
            workdir: workdir.into(),
            nodata: 32767.0,
            gdalwarp: PathBuf::from("gdalwarp"),
        }
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn clip_path(&self, identifier: &str) -> PathBuf {
        self.workdir.join(format!("{identifier}_topo.tif"))
    }

    pub fn sinusoidal_path(&self, identifier: &str) -> PathBuf {
        self.workdir.join(format!("{identifier}_topo_sinu.tif"))
    }

    pub fn clip_command(&self, footprint: &Footprint) -> Command {
        let mut cmd = Command::new(&self.gdalwarp);
        cmd.args(["-overwrite", "-of", "GTiff", "-te"])
            .args(
                [
                    footprint.min_lon,
                    footprint.min_lat,
                    footprint.max_lon,
                    footprint.max_lat,
                ]
                .map(|v| v.to_string()),
            )
            .arg("-te_srs")
            .arg(lunar_longlat_srs())
            .arg(&self.dem)
            .arg(self.clip_path(&footprint.identifier));
        cmd
    }

    pub fn reproject_command(&self, footprint: &Footprint) -> Command {
        let mut cmd = Command::new(&self.gdalwarp);
        cmd.args(["-overwrite", "-of", "GTiff", "-t_srs"])
            .arg(lunar_sinusoidal_srs(footprint.center_lon))
            .arg(self.clip_path(&footprint.identifier))
            .arg(self.sinusoidal_path(&footprint.identifier));
        cmd
    }
}

impl SurfaceProvider for GdalSurfaceProvider {
    fn prepare(&self, footprint: &Footprint) -> Result<PreparedSurface, ShadingError> {
        fs::create_dir_all(&self.workdir).map_err(|source| ShadingError::Io {
            path: self.workdir.clone(),
            source,
        })?;
        run(self.clip_command(footprint)).map_err(ShadingError::Surface)?;
        run(self.reproject_command(footprint)).map_err(ShadingError::Surface)?;

        let path = self.sinusoidal_path(&footprint.identifier);
        let elevation = read_raster(&path)?;
        let roi = RoiMask::from_valid_below(&elevation, self.nodata);
        debug!(
            identifier = %footprint.identifier,
            width = elevation.width(),
            height = elevation.height(),
            valid = roi.count(),
            "surface prepared"
        );
        Ok(PreparedSurface::new(&footprint.identifier, path, roi))
    }
}

/// Renders hillshades with `gdaldem hillshade`.
#[derive(Debug, Clone)]
pub struct GdalHillshadeRenderer {
    pub workdir: PathBuf,
    pub gdaldem: PathBuf,
}

impl GdalHillshadeRenderer {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            gdaldem: PathBuf::from("gdaldem"),
        }
    }

    pub fn output_path(
        &self,
        surface: &PreparedSurface,
        sun: &SunGeometry,
        zfactor: f64,
    ) -> PathBuf {
        self.workdir
            .join(hillshade_file_name(surface.identifier(), sun, zfactor))
    }

    pub fn hillshade_command(
        &self,
        surface: &PreparedSurface,
        sun: &SunGeometry,
        zfactor: f64,
    ) -> Command {
        let mut cmd = Command::new(&self.gdaldem);
        cmd.args(["hillshade", "-of", "GTiff", "-alg", "ZevenbergenThorne"])
            .arg("-az")
            .arg(sun.azimuth.to_string())
            .arg("-alt")
            .arg(sun.altitude().to_string())
            .arg("-z")
            .arg(zfactor.to_string())
            .arg(surface.elevation_path())
            .arg(self.output_path(surface, sun, zfactor));
        cmd
    }
}

impl ShadingRenderer for GdalHillshadeRenderer {
    fn render(
        &self,
        surface: &PreparedSurface,
        sun: &SunGeometry,
        zfactor: f64,
    ) -> Result<Raster<u8>, ShadingError> {
        run(self.hillshade_command(surface, sun, zfactor)).map_err(ShadingError::Render)?;
        let shade = read_raster(&self.output_path(surface, sun, zfactor))?;
        Ok(shade.map(|&v| v.round().clamp(0.0, 255.0) as u8))
    }
}

/// Run a GDAL tool, turning a spawn failure or non-zero exit into a message.
fn run(mut cmd: Command) -> Result<(), String> {
    debug!("Command: {:?}", cmd);
    let output = cmd
        .output()
        .map_err(|e| format!("failed to run {:?}: {e}", cmd.get_program()))?;
    if !output.status.success() {
        return Err(format!(
            "{:?} exited with {}: {}",
            cmd.get_program(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(())
}

/// Read the first band of a single-channel TIFF as `f64`.
pub fn read_raster(path: &Path) -> Result<Raster<f64>, ShadingError> {
    let tiff_err = |source| ShadingError::Tiff {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|source| ShadingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut decoder = Decoder::new(BufReader::new(file)).map_err(tiff_err)?;

    let (width, height) = decoder.dimensions().map_err(tiff_err)?;
    match decoder.colortype().map_err(tiff_err)? {
        ColorType::Gray(_) => {}
        other => {
            return Err(ShadingError::UnsupportedRaster {
                path: path.to_path_buf(),
                reason: format!("expected a single gray band, found {other:?}"),
            })
        }
    }

    let data: Vec<f64> = match decoder.read_image().map_err(tiff_err)? {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        _ => {
            return Err(ShadingError::UnsupportedRaster {
                path: path.to_path_buf(),
                reason: "64-bit integer samples".to_string(),
            })
        }
    };

    Raster::new(width as usize, height as usize, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use tiff::encoder::{colortype, TiffEncoder};

    fn footprint() -> Footprint {
        Footprint {
            identifier: "M3G20090612T013201".to_string(),
            min_lon: -12.5,
            min_lat: 3.0,
            max_lon: -10.0,
            max_lat: 8.25,
            center_lon: -11.25,
        }
    }

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn hillshade_name_uses_two_decimals() {
        let sun = SunGeometry::new(101.5, 38.0);
        assert_eq!(
            hillshade_file_name("M3G1", &sun, 1.5),
            "M3G1_hillshade_az101.50_inc38.00_z1.50.tif"
        );
    }

    #[test]
    fn clip_command_targets_footprint() {
        let provider = GdalSurfaceProvider::new("/data/lola.tif", "/work");
        let cmd = provider.clip_command(&footprint());
        assert_eq!(cmd.get_program(), OsStr::new("gdalwarp"));
        assert_eq!(
            args(&cmd),
            [
                "-overwrite",
                "-of",
                "GTiff",
                "-te",
                "-12.5",
                "3",
                "-10",
                "8.25",
                "-te_srs",
                "+proj=longlat +a=1737400 +b=1737400 +no_defs",
                "/data/lola.tif",
                "/work/M3G20090612T013201_topo.tif",
            ]
        );
    }

    #[test]
    fn reproject_command_centres_sinusoidal_grid() {
        let provider = GdalSurfaceProvider::new("/data/lola.tif", "/work");
        let args = args(&provider.reproject_command(&footprint()));
        assert_eq!(
            args[4],
            "+proj=sinu +lon_0=-11.25 +x_0=0 +y_0=0 +a=1737400 +b=1737400 +no_defs"
        );
        assert_eq!(args[6], "/work/M3G20090612T013201_topo_sinu.tif");
    }

    #[test]
    fn hillshade_command_uses_altitude() {
        let renderer = GdalHillshadeRenderer::new("/work");
        let dem = Raster::filled(1, 1, 0.0);
        let surface = PreparedSurface::new(
            "M3G1",
            "/work/M3G1_topo_sinu.tif",
            RoiMask::from_valid_below(&dem, 32767.0),
        );
        let cmd = renderer.hillshade_command(&surface, &SunGeometry::new(90.0, 30.5), 2.0);
        assert_eq!(cmd.get_program(), OsStr::new("gdaldem"));
        assert_eq!(
            args(&cmd),
            [
                "hillshade",
                "-of",
                "GTiff",
                "-alg",
                "ZevenbergenThorne",
                "-az",
                "90",
                "-alt",
                "59.5",
                "-z",
                "2",
                "/work/M3G1_topo_sinu.tif",
                "/work/M3G1_hillshade_az90.00_inc30.50_z2.00.tif",
            ]
        );
    }

    #[test]
    fn reads_gray_tiffs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");
        let file = File::create(&path).unwrap();
        TiffEncoder::new(file)
            .unwrap()
            .write_image::<colortype::Gray32Float>(3, 2, &[1.0, 2.0, 32767.0, -4.5, 5.0, 6.0])
            .unwrap();

        let raster = read_raster(&path).unwrap();
        assert_eq!((raster.width(), raster.height()), (3, 2));
        assert_eq!(raster.data(), &[1.0, 2.0, 32767.0, -4.5, 5.0, 6.0]);
        assert_eq!(RoiMask::from_valid_below(&raster, 32767.0).count(), 5);

        let path = dir.path().join("shade.tif");
        TiffEncoder::new(File::create(&path).unwrap())
            .unwrap()
            .write_image::<colortype::Gray8>(2, 1, &[0, 255])
            .unwrap();
        assert_eq!(read_raster(&path).unwrap().data(), &[0.0, 255.0]);
    }

    #[test]
    fn missing_raster_is_an_io_error() {
        assert!(matches!(
            read_raster(Path::new("/nonexistent/dem.tif")),
            Err(ShadingError::Io { .. })
        ));
    }
}
