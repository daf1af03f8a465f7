//! 三套坐标系之间的显式变换：CAD 文档空间 → 画布空间 → 三维单位空间。

use serde::{Deserialize, Serialize};

use crate::geometry::{Bounds2D, Point2, Point3};

/// 二维编辑画布尺寸（像素）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 500.0,
        }
    }
}

/// 三维预览中单层楼板的占地尺寸（场景单位）。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub width: f64,
    pub depth: f64,
}

impl Default for Footprint {
    fn default() -> Self {
        Self {
            width: 20.0,
            depth: 15.0,
        }
    }
}

/// 文档空间到画布空间的等比缩放与居中变换。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationTransform {
    pub scale: f64,
    pub center_x: f64,
    pub center_y: f64,
    pub target_w: f64,
    pub target_h: f64,
}

impl NormalizationTransform {
    /// 宽高不足 1 的范围按 1 处理，保证缩放系数有限且为正。
    pub fn fit(bounds: &Bounds2D, target: CanvasSize) -> Self {
        let width = bounds.width().max(1.0);
        let height = bounds.height().max(1.0);
        let mut scale = (target.width / width).min(target.height / height);
        if !scale.is_finite() || scale <= 0.0 {
            scale = 1.0;
        }
        let center = bounds.center();
        Self {
            scale,
            center_x: center.x(),
            center_y: center.y(),
            target_w: target.width,
            target_h: target.height,
        }
    }

    /// 画布 Y 轴向下，因此文档 Y 需翻转。
    #[inline]
    pub fn apply(&self, point: Point2) -> Point2 {
        Point2::new(
            (point.x() - self.center_x) * self.scale + self.target_w / 2.0,
            self.target_h / 2.0 - (point.y() - self.center_y) * self.scale,
        )
    }
}

/// 画布空间到三维单位空间的变换，X/Z 方向独立缩放，画布中心映射到原点。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneTransform {
    pub scale_x: f64,
    pub scale_z: f64,
    pub canvas_w: f64,
    pub canvas_h: f64,
}

impl SceneTransform {
    pub fn new(canvas: CanvasSize, footprint: Footprint) -> Self {
        let canvas_w = canvas.width.max(1.0);
        let canvas_h = canvas.height.max(1.0);
        Self {
            scale_x: footprint.width / canvas_w,
            scale_z: footprint.depth / canvas_h,
            canvas_w,
            canvas_h,
        }
    }

    /// 将画布点投影到给定高度的水平面上。
    #[inline]
    pub fn apply(&self, point: Point2, elevation: f64) -> Point3 {
        Point3::new(
            (point.x() - self.canvas_w / 2.0) * self.scale_x,
            elevation,
            (point.y() - self.canvas_h / 2.0) * self.scale_z,
        )
    }

    #[inline]
    pub fn width(&self, canvas_width: f64) -> f64 {
        canvas_width * self.scale_x
    }

    #[inline]
    pub fn depth(&self, canvas_height: f64) -> f64 {
        canvas_height * self.scale_z
    }
}

/// 轮廓叠加专用：先归一化到画布，再进入三维空间。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlineTransform {
    pub normalization: NormalizationTransform,
    pub scene: SceneTransform,
}

impl OutlineTransform {
    #[inline]
    pub fn compose(normalization: NormalizationTransform, scene: SceneTransform) -> Self {
        Self {
            normalization,
            scene,
        }
    }

    #[inline]
    pub fn apply(&self, point: Point2, elevation: f64) -> Point3 {
        self.scene
            .apply(self.normalization.apply(point), elevation)
    }
}
