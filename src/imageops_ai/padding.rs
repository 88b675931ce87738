use image::{GenericImageView, ImageBuffer, Pixel};

/// Mirror index `i` into `0..n` without repeating the edge pixel
/// (`dcb|abcd|cba`).
fn reflect_101(i: i64, n: u32) -> u32 {
    let n = n as i64;
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let i = i.rem_euclid(period);
    (if i < n { i } else { period - i }) as u32
}

/// Pad on the right and bottom with mirrored content.
pub fn pad_reflect<I, P>(image: &I, right: u32, bottom: u32) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    I: GenericImageView<Pixel = P>,
    P: Pixel,
{
    let (width, height) = image.dimensions();
    ImageBuffer::from_fn(width + right, height + bottom, |x, y| {
        image.get_pixel(reflect_101(x as i64, width), reflect_101(y as i64, height))
    })
}

/// Pad so both sides become multiples of `multiple`; returns the padding used.
pub fn pad_to_multiple<I, P>(
    image: &I,
    multiple: u32,
) -> (ImageBuffer<P, Vec<P::Subpixel>>, u32, u32)
where
    I: GenericImageView<Pixel = P>,
    P: Pixel,
{
    let (width, height) = image.dimensions();
    let multiple = multiple.max(1);
    let right = (multiple - width % multiple) % multiple;
    let bottom = (multiple - height % multiple) % multiple;
    (pad_reflect(image, right, bottom), right, bottom)
}
