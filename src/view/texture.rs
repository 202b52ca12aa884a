//! Texture loading: bytes from disk or over HTTP, decoded with `image`,
//! uploaded as sRGB RGBA8.

use tracing::{debug, info};

use crate::error::{Result, SceneError};

/// Decoded RGBA8 pixels ready for upload.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ImageData {
    pub fn from_bytes(path: &str, bytes: &[u8]) -> Result<Self> {
        let rgba = image::load_from_memory(bytes)
            .map_err(|e| SceneError::resource(path, e))?
            .to_rgba8();
        let (width, height) = rgba.dimensions();
        debug!("decoded {path}: {width}x{height}");
        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
        })
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub async fn load_bytes(path: &str) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| SceneError::resource(path, e))
}

#[cfg(target_arch = "wasm32")]
pub async fn load_bytes(path: &str) -> Result<Vec<u8>> {
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::JsFuture;

    let fail = |reason: String| SceneError::resource(path, reason);

    let window = web_sys::window().ok_or_else(|| fail("no global `window`".into()))?;
    let response = JsFuture::from(window.fetch_with_str(path))
        .await
        .map_err(|e| fail(format!("{e:?}")))?
        .dyn_into::<web_sys::Response>()
        .map_err(|_| fail("fetch did not return a Response".into()))?;
    if !response.ok() {
        return Err(fail(format!("HTTP {}", response.status())));
    }

    let buffer = response.array_buffer().map_err(|e| fail(format!("{e:?}")))?;
    let buffer = JsFuture::from(buffer)
        .await
        .map_err(|e| fail(format!("{e:?}")))?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

pub async fn load_image(path: &str) -> Result<ImageData> {
    let bytes = load_bytes(path).await?;
    let image = ImageData::from_bytes(path, &bytes)?;
    info!("loaded texture {path} ({}x{})", image.width, image.height);
    Ok(image)
}

pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl GpuTexture {
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, label: &str, image: &ImageData) -> Self {
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        // Repeat so the background can scroll past its edges.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }
}
