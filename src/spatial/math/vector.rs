use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

#[derive(Default, Clone, Copy, Debug, PartialEq, PartialOrd)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
#[repr(C)]
pub struct V3c<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

pub type V3cf32 = V3c<f32>;

impl<T: Copy> V3c<T> {
    pub fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
    pub fn unit(scale: T) -> Self {
        Self {
            x: scale,
            y: scale,
            z: scale,
        }
    }
}

impl<T> SubAssign for V3c<T>
where
    T: Copy + Sub<Output = T>,
{
    fn sub_assign(&mut self, other: V3c<T>) {
        *self = *self - other;
    }
}

impl<T> AddAssign for V3c<T>
where
    T: Copy + Add<Output = T>,
{
    fn add_assign(&mut self, other: V3c<T>) {
        *self = *self + other;
    }
}

impl<T> V3c<T>
where
    T: num_traits::Signed + Copy,
{
    pub fn abs(&self) -> Self {
        V3c::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    pub fn signum(&self) -> Self {
        V3c::new(self.x.signum(), self.y.signum(), self.z.signum())
    }
}

impl<T> V3c<T>
where
    T: PartialOrd + Copy,
{
    /// Componentwise minimum of the two vectors
    pub fn min_by_component(self, other: V3c<T>) -> Self {
        V3c::new(
            if self.x < other.x { self.x } else { other.x },
            if self.y < other.y { self.y } else { other.y },
            if self.z < other.z { self.z } else { other.z },
        )
    }

    /// Componentwise maximum of the two vectors
    pub fn max_by_component(self, other: V3c<T>) -> Self {
        V3c::new(
            if self.x > other.x { self.x } else { other.x },
            if self.y > other.y { self.y } else { other.y },
            if self.z > other.z { self.z } else { other.z },
        )
    }
}

impl V3c<f32> {
    pub fn length(&self) -> f32 {
        ((self.x * self.x) + (self.y * self.y) + (self.z * self.z)).sqrt()
    }

    pub fn length_squared(&self) -> f32 {
        (self.x * self.x) + (self.y * self.y) + (self.z * self.z)
    }

    pub fn normalized(self) -> V3c<f32> {
        self / self.length()
    }
}

impl<T> V3c<T>
where
    T: Mul<Output = T> + Div<Output = T> + Add<Output = T> + Sub<Output = T> + Copy,
{
    pub fn dot(&self, other: &V3c<T>) -> T {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: V3c<T>) -> V3c<T> {
        V3c {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }
}

impl<T: Add<Output = T>> Add for V3c<T> {
    type Output = V3c<T>;

    fn add(self, other: V3c<T>) -> V3c<T> {
        V3c {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl<T> Sub for V3c<T>
where
    T: Copy + Sub<Output = T>,
{
    type Output = V3c<T>;

    fn sub(self, other: V3c<T>) -> V3c<T> {
        V3c {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl<T: Mul<Output = T> + Copy> Mul<T> for V3c<T> {
    type Output = V3c<T>;

    fn mul(self, scalar: T) -> V3c<T> {
        V3c {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }
}

impl<T: Mul<Output = T> + Copy> Mul<V3c<T>> for V3c<T> {
    type Output = V3c<T>;

    fn mul(self, other: V3c<T>) -> V3c<T> {
        V3c {
            x: self.x * other.x,
            y: self.y * other.y,
            z: self.z * other.z,
        }
    }
}

impl<T: Div<Output = T> + Copy> Div<T> for V3c<T> {
    type Output = V3c<T>;

    fn div(self, scalar: T) -> V3c<T> {
        V3c {
            x: self.x / scalar,
            y: self.y / scalar,
            z: self.z / scalar,
        }
    }
}

impl From<V3c<u32>> for V3c<f32> {
    fn from(vec: V3c<u32>) -> V3c<f32> {
        V3c::new(vec.x as f32, vec.y as f32, vec.z as f32)
    }
}

impl From<[f32; 3]> for V3c<f32> {
    fn from(vec: [f32; 3]) -> V3c<f32> {
        V3c::new(vec[0], vec[1], vec[2])
    }
}

impl From<V3c<f32>> for nalgebra::Vector3<f32> {
    fn from(vec: V3c<f32>) -> nalgebra::Vector3<f32> {
        nalgebra::Vector3::new(vec.x, vec.y, vec.z)
    }
}

impl From<V3c<f32>> for nalgebra::Point3<f32> {
    fn from(vec: V3c<f32>) -> nalgebra::Point3<f32> {
        nalgebra::Point3::new(vec.x, vec.y, vec.z)
    }
}

impl From<nalgebra::Vector3<f32>> for V3c<f32> {
    fn from(vec: nalgebra::Vector3<f32>) -> V3c<f32> {
        V3c::new(vec.x, vec.y, vec.z)
    }
}

impl From<nalgebra::Point3<f32>> for V3c<f32> {
    fn from(point: nalgebra::Point3<f32>) -> V3c<f32> {
        V3c::new(point.x, point.y, point.z)
    }
}
