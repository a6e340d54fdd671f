use palette::{FromColor, Hsl, LinSrgb, Mix, Srgb};

/// رنگ‌های مورد استفاده در نمودار
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Theme {
    pub background: Srgb,
    pub text: Srgb,
    pub success: Srgb, // کندل‌های صعودی و سمت خرید
    pub danger: Srgb,  // کندل‌های نزولی و سمت فروش
    pub warning: Srgb,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: rgb8(24, 22, 22),
            text: rgb8(197, 201, 197),
            success: rgb8(81, 205, 160),
            danger: rgb8(192, 80, 77),
            warning: rgb8(238, 216, 139),
        }
    }
}

impl Theme {
    /// طیف رنگی نقشه حرارتی عدم تعادل: فروش (منفی) تا خرید (مثبت)
    pub fn imbalance_scale(&self) -> Vec<(f32, String)> {
        let mid = darken(self.background, -0.08);

        diverging_scale(darken(self.danger, 0.15), mid, darken(self.success, 0.15), 8)
    }

    /// طیف رنگی پنل شاخص‌ها
    pub fn metrics_scale(&self) -> Vec<(f32, String)> {
        diverging_scale(self.danger, self.warning, self.success, 8)
    }
}

fn rgb8(r: u8, g: u8, b: u8) -> Srgb {
    Srgb::new(r, g, b).into_format()
}

/// Evenly spaced stops from `low` through `mid` to `high`, mixed in linear
/// light. `steps` counts the stops on each half.
pub fn diverging_scale(low: Srgb, mid: Srgb, high: Srgb, steps: usize) -> Vec<(f32, String)> {
    let steps = steps.max(1);
    let half = |from: Srgb, to: Srgb| {
        let from: LinSrgb = from.into_linear();
        let to: LinSrgb = to.into_linear();

        (0..steps).map(move |i| {
            let t = i as f32 / steps as f32;
            Srgb::from_linear(from.mix(to, t))
        })
    };

    let colors: Vec<Srgb> = half(low, mid)
        .chain(half(mid, high))
        .chain(std::iter::once(high))
        .collect();

    let last = (colors.len() - 1) as f32;
    colors
        .into_iter()
        .enumerate()
        .map(|(i, color)| (i as f32 / last, color_to_hex(color)))
        .collect()
}

/// تبدیل رنگ به کد رنگ هگز (Hex)
pub fn color_to_hex(color: Srgb) -> String {
    let rgb: Srgb<u8> = color.into_format();
    format!("#{:02X}{:02X}{:02X}", rgb.red, rgb.green, rgb.blue)
}

/// تیره کردن یک رنگ به میزان مشخص (مقدار منفی رنگ را روشن می‌کند)
pub fn darken(color: Srgb, amount: f32) -> Srgb {
    let mut hsl = Hsl::from_color(color);

    hsl.lightness = (hsl.lightness - amount).clamp(0.0, 1.0);

    Srgb::from_color(hsl)
}
