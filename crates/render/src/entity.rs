//! Scene entities and their arena storage.
//!
//! The entity kinds are a closed set, so they are a plain enum. Entities
//! live in a generational arena; a key stays valid until its entity is
//! removed and never aliases a later entity in the same slot.

use cubeworld_common::Transform;
use glam::{Quat, Vec3};
use serde::Serialize;

/// A renderable object in the scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Entity {
    /// Static cube.
    Prop { transform: Transform, color: Vec3 },
    /// Cube rotating about `axis` at `speed` radians per second.
    Spinner {
        transform: Transform,
        axis: Vec3,
        speed: f32,
        color: Vec3,
    },
    /// Cube circling `center` in the XZ plane.
    Orbiter {
        transform: Transform,
        center: Vec3,
        radius: f32,
        speed: f32,
        angle: f32,
        color: Vec3,
    },
}

impl Entity {
    pub fn prop(position: Vec3, color: Vec3) -> Self {
        Self::Prop {
            transform: Transform::from_position(position),
            color,
        }
    }

    pub fn spinner(position: Vec3, axis: Vec3, speed: f32, color: Vec3) -> Self {
        Self::Spinner {
            transform: Transform::from_position(position),
            axis: axis.normalize_or(Vec3::Y),
            speed,
            color,
        }
    }

    pub fn orbiter(center: Vec3, radius: f32, speed: f32, color: Vec3) -> Self {
        Self::Orbiter {
            transform: Transform::from_position(center + Vec3::X * radius),
            center,
            radius,
            speed,
            angle: 0.0,
            color,
        }
    }

    pub fn transform(&self) -> &Transform {
        match self {
            Self::Prop { transform, .. }
            | Self::Spinner { transform, .. }
            | Self::Orbiter { transform, .. } => transform,
        }
    }

    pub fn color(&self) -> Vec3 {
        match self {
            Self::Prop { color, .. } | Self::Spinner { color, .. } | Self::Orbiter { color, .. } => {
                *color
            }
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Prop { .. } => "prop",
            Self::Spinner { .. } => "spinner",
            Self::Orbiter { .. } => "orbiter",
        }
    }

    /// Advance animation by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        match self {
            Self::Prop { .. } => {}
            Self::Spinner {
                transform,
                axis,
                speed,
                ..
            } => {
                transform.rotation =
                    (Quat::from_axis_angle(*axis, *speed * dt) * transform.rotation).normalize();
            }
            Self::Orbiter {
                transform,
                center,
                radius,
                speed,
                angle,
                ..
            } => {
                *angle = (*angle + *speed * dt).rem_euclid(std::f32::consts::TAU);
                transform.position =
                    *center + Vec3::new(angle.cos() * *radius, 0.0, angle.sin() * *radius);
            }
        }
    }
}

/// Stable handle to an entity in an [`EntityArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EntityKey {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

#[derive(Debug, Clone, Default)]
pub struct EntityArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: Entity) -> EntityKey {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entity = Some(entity);
            return EntityKey {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entity: Some(entity),
        });
        EntityKey {
            index,
            generation: 0,
        }
    }

    pub fn remove(&mut self, key: EntityKey) -> Option<Entity> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let entity = slot.entity.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.len -= 1;
        Some(entity)
    }

    pub fn get(&self, key: EntityKey) -> Option<&Entity> {
        self.slots
            .get(key.index as usize)
            .filter(|s| s.generation == key.generation)
            .and_then(|s| s.entity.as_ref())
    }

    pub fn get_mut(&mut self, key: EntityKey) -> Option<&mut Entity> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|s| s.generation == key.generation)
            .and_then(|s| s.entity.as_mut())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.entity.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.len = 0;
    }

    /// Live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityKey, &Entity)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entity.as_ref().map(|e| {
                (
                    EntityKey {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    e,
                )
            })
        })
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.slots.iter_mut().filter_map(|s| s.entity.as_mut())
    }
}
