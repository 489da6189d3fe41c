/// One particle slot's state: four f32 channels, one texel.
///
/// In a position texture `(x, y, z)` is a world position and `w` an auxiliary
/// scalar; in a direction texture `(x, y, z)` is a displacement vector.
pub type Texel = [f32; 4];

/// A `size x size` grid of f32x4 texels, row-major, slot `i = row * size + col`.
///
/// This is the only format in which simulation state crosses between frames.
/// After initialization the authoritative copy lives on the device; this
/// CPU-side form exists to seed it and to back the headless executor.
#[derive(Clone, Debug, PartialEq)]
pub struct StateTexture {
    size: u32,
    texels: Vec<Texel>,
}

impl StateTexture {
    pub fn new(size: u32) -> Self {
        StateTexture {
            size,
            texels: vec![[0.0; 4]; (size * size) as usize],
        }
    }

    pub fn from_texels(size: u32, texels: Vec<Texel>) -> Self {
        assert_eq!(texels.len(), (size * size) as usize);
        StateTexture { size, texels }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn texel_count(&self) -> u32 {
        self.size * self.size
    }

    pub fn index(&self, row: u32, col: u32) -> u32 {
        row * self.size + col
    }

    pub fn get(&self, slot: u32) -> Texel {
        self.texels[slot as usize]
    }

    pub fn set(&mut self, slot: u32, texel: Texel) {
        self.texels[slot as usize] = texel;
    }

    pub fn texels(&self) -> &[Texel] {
        &self.texels
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }

    /// Uploads the grid into a freshly created `Rgba32Float` texture.
    pub fn create_device_texture(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
    ) -> wgpu::Texture {
        let extent = wgpu::Extent3d {
            width: self.size,
            height: self.size,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            texture.as_image_copy(),
            self.as_bytes(),
            wgpu::ImageDataLayout {
                offset: 0,
                // 4 channels x 4 bytes per texel.
                bytes_per_row: Some(16 * self.size),
                rows_per_image: None,
            },
            extent,
        );
        texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_indexing() {
        let mut grid = StateTexture::new(4);
        assert_eq!(grid.texel_count(), 16);
        assert_eq!(grid.index(0, 3), 3);
        assert_eq!(grid.index(2, 1), 9);
        grid.set(grid.index(2, 1), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(grid.get(9), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(grid.get(8), [0.0; 4]);
    }

    #[test]
    fn byte_view_is_one_texel_per_slot() {
        let grid = StateTexture::new(8);
        assert_eq!(grid.as_bytes().len(), 8 * 8 * 16);
    }
}
