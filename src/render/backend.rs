use std::time::Duration;

/// Size of a surface in pixels. It's a simple struct to hold width and height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size scaled by `factor`, truncating fractional pixels.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            width: (self.width as f32 * factor) as u32,
            height: (self.height as f32 * factor) as u32,
        }
    }
}

impl std::fmt::Display for SurfaceSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8 bits per channel, straight alpha, rows top to bottom
    Rgba8,
}

/// CPU copy of a rendered frame.
#[derive(Clone)]
pub struct RgbaImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
}

impl RgbaImage {
    pub fn from_raw(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
    ) -> anyhow::Result<Self> {
        if stride < width * 4 {
            anyhow::bail!("stride {stride} is smaller than a row of {width} pixels");
        }
        if pixels.len() < (height as usize) * (stride as usize) {
            anyhow::bail!(
                "pixel buffer of {} bytes too small for {width}x{height} (stride {stride})",
                pixels.len()
            );
        }

        Ok(Self {
            pixels,
            width,
            height,
            stride,
            format,
        })
    }

    /// Row `y` without stride padding.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = (y * self.stride) as usize;
        &self.pixels[start..start + (self.width * 4) as usize]
    }
}

impl std::fmt::Debug for RgbaImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbaImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.pixels.len())
            .finish()
    }
}

/// The map renderer driven by the pipeline.
///
/// Calls occur on the thread that owns the GL context. Implementations must apply every call
/// before returning and must not reorder or drop state changes.
pub trait MapEngine {
    fn name(&self) -> &str;

    /// Start loading the scene at `path` (a file path or a URL). Loading completes during `update`.
    fn load_scene(&mut self, path: &str) -> anyhow::Result<()>;

    fn pixel_scale(&self) -> f32;
    fn set_pixel_scale(&mut self, scale: f32);

    /// Resize the render target, in physical (already anti-alias scaled) pixels.
    fn resize(&mut self, width: u32, height: u32);

    fn set_position(&mut self, lng: f64, lat: f64);
    fn set_zoom(&mut self, zoom: f32);
    fn set_tilt(&mut self, radians: f32);
    fn set_rotation(&mut self, radians: f32);

    /// Advance pending asynchronous work for at most `budget`.
    ///
    /// Returns `true` when nothing is left to do.
    fn update(&mut self, budget: Duration) -> bool;

    /// Draw one frame into the current GL context.
    fn render(&mut self) -> anyhow::Result<()>;
}

/// Offscreen GL surface the engine renders into.
pub trait GlContext {
    fn init(&mut self) -> anyhow::Result<()>;
    fn resize(&mut self, size: SurfaceSize) -> anyhow::Result<()>;
    fn make_current(&mut self) -> anyhow::Result<()>;
    fn size(&self) -> SurfaceSize;

    /// Read back the framebuffer. Rows are returned top to bottom.
    fn read_pixels(&mut self) -> anyhow::Result<RgbaImage>;
}
