use image::Pixel;
use imageproc::definitions::{Clamp, Image};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};

/// 2x3 affine transform in row-major order:
/// `x' = m[0]·x + m[1]·y + m[2]`, `y' = m[3]·x + m[4]·y + m[5]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub m: [f32; 6],
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        m: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
    };

    /// Least-squares similarity transform (rotation, uniform scale,
    /// translation) mapping `src` onto `dst`.
    pub fn estimate_similarity(src: &[[f32; 2]], dst: &[[f32; 2]]) -> Option<Self> {
        if src.len() != dst.len() || src.len() < 2 {
            return None;
        }
        let n = src.len() as f64;
        let mean = |points: &[[f32; 2]]| {
            let (sx, sy) = points
                .iter()
                .fold((0.0, 0.0), |(x, y), p| (x + p[0] as f64, y + p[1] as f64));
            (sx / n, sy / n)
        };
        let (msx, msy) = mean(src);
        let (mdx, mdy) = mean(dst);

        let (mut dot, mut cross, mut norm) = (0.0f64, 0.0f64, 0.0f64);
        for (s, d) in src.iter().zip(dst) {
            let (xs, ys) = (s[0] as f64 - msx, s[1] as f64 - msy);
            let (xd, yd) = (d[0] as f64 - mdx, d[1] as f64 - mdy);
            dot += xs * xd + ys * yd;
            cross += xs * yd - ys * xd;
            norm += xs * xs + ys * ys;
        }
        if norm <= f64::EPSILON {
            return None;
        }

        let a = dot / norm;
        let b = cross / norm;
        let tx = mdx - (a * msx - b * msy);
        let ty = mdy - (b * msx + a * msy);
        Some(Self {
            m: [
                a as f32, -b as f32, tx as f32, b as f32, a as f32, ty as f32,
            ],
        })
    }

    pub fn apply(&self, [x, y]: [f32; 2]) -> [f32; 2] {
        let m = &self.m;
        [m[0] * x + m[1] * y + m[2], m[3] * x + m[4] * y + m[5]]
    }

    pub fn invert(&self) -> Option<Self> {
        let [a, b, tx, c, d, ty] = self.m;
        let det = a * d - b * c;
        if det.abs() <= f32::EPSILON {
            return None;
        }
        let (ia, ib, ic, id) = (d / det, -b / det, -c / det, a / det);
        Some(Self {
            m: [
                ia,
                ib,
                -(ia * tx + ib * ty),
                ic,
                id,
                -(ic * tx + id * ty),
            ],
        })
    }

    /// Multiply every coefficient, i.e. scale the output coordinates.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            m: self.m.map(|v| v * factor),
        }
    }

    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        let mut m = self.m;
        m[2] += dx;
        m[5] += dy;
        Self { m }
    }

    pub fn projection(&self) -> Option<Projection> {
        let [a, b, tx, c, d, ty] = self.m;
        Projection::from_matrix([a, b, tx, c, d, ty, 0.0, 0.0, 1.0])
    }
}

/// Warp `image` into a `width`×`height` canvas; `transform` maps source
/// coordinates to canvas coordinates. Uncovered pixels get `border`.
pub fn warp_affine<P>(
    image: &Image<P>,
    transform: &Affine,
    width: u32,
    height: u32,
    border: P,
) -> Option<Image<P>>
where
    P: Pixel + Send + Sync + 'static,
    <P as Pixel>::Subpixel: Send + Sync + Into<f32> + Clamp<f32>,
{
    let projection = transform.projection()?;
    let mut out = Image::from_pixel(width, height, border);
    warp_into(image, &projection, Interpolation::Bilinear, border, &mut out);
    Some(out)
}
