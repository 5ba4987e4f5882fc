use crate::data::ImageItem;
use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;

#[derive(Clone, Default)]
pub struct GanBatcher {}

#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    /// Brightness rescaled from `[0, 255]` to `[-1, 1]`, the range of the generator's `tanh`.
    ///
    /// The mappings are:
    ///
    /// * `x = value / 127.5 - 1`,
    /// * `value = (x + 1) * 127.5`.
    ///
    /// # Shape
    /// [batch_size, channels, height, width]
    pub images: Tensor<B, 4>,
}

impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for GanBatcher {
    fn batch(&self, items: Vec<ImageItem>, device: &B::Device) -> ImageBatch<B> {
        let batch_size = items.len();
        let [channels, height, width] = items
            .first()
            .map(|item| [item.channels, item.height, item.width])
            .unwrap_or([1, 1, 1]);

        let pixels: Vec<u8> = items.into_iter().flat_map(|item| item.pixels).collect();
        let data = TensorData::new(pixels, [batch_size, channels, height, width])
            .convert::<B::FloatElem>();
        let images = Tensor::<B, 4>::from_data(data, device) / 127.5 - 1.;

        ImageBatch { images }
    }
}
