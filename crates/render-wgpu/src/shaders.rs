//! WGSL sources. The frame block (binding 0 of group 0) is shared by the
//! voxel and cube pipelines.

macro_rules! frame_wgsl {
    () => {
        r#"
struct Light {
    position: vec3<f32>,
    intensity: f32,
    direction: vec3<f32>,
    linear_attenuation: f32,
    color: vec3<f32>,
    quadratic_attenuation: f32,
    kind: u32,
    enabled: u32,
    _pad: vec2<u32>,
};

struct Lighting {
    eye_position: vec3<f32>,
    light_count: u32,
    lights: array<Light, 2>,
};

struct Frame {
    view_proj: mat4x4<f32>,
    lighting: Lighting,
};

@group(0) @binding(0)
var<uniform> frame: Frame;

fn shade(
    world_pos: vec3<f32>,
    n: vec3<f32>,
    albedo: vec3<f32>,
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    power: f32,
) -> vec3<f32> {
    var color = ambient.rgb * ambient.a * albedo;
    let v = normalize(frame.lighting.eye_position - world_pos);
    let count = min(frame.lighting.light_count, 2u);
    for (var i = 0u; i < count; i = i + 1u) {
        let light = frame.lighting.lights[i];
        if (light.enabled == 0u) {
            continue;
        }
        var l = -light.direction;
        var atten = 1.0;
        if (light.kind != 1u) {
            let to_light = light.position - world_pos;
            let d = length(to_light);
            l = to_light / max(d, 1e-4);
            atten = 1.0 / (1.0 + light.linear_attenuation * d + light.quadratic_attenuation * d * d);
            if (light.kind == 3u) {
                atten = atten * pow(max(dot(-l, light.direction), 0.0), 8.0);
            }
        }
        let ndl = max(dot(n, l), 0.0);
        let h = normalize(l + v);
        let spec = pow(max(dot(n, h), 0.0), power) * step(0.0, ndl);
        let lit = diffuse.rgb * diffuse.a * albedo * ndl + specular.rgb * specular.a * spec;
        color = color + lit * light.color * light.intensity * atten;
    }
    return color;
}
"#
    };
}

/// Voxel world: decodes the packed vertex code into corner, normal and uv.
pub const VOXEL_SHADER: &str = concat!(
    frame_wgsl!(),
    r#"
struct VoxelObject {
    world: mat4x4<f32>,
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
    specular_power: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(1) @binding(0)
var<uniform> object: VoxelObject;

struct VoxelInput {
    @location(0) center: vec3<f32>,
    @location(1) code: u32,
};

struct VoxelOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

// bits 0..3 corner (4 = +x, 2 = +y, 1 = +z), 3..6 face, 6..8 quad corner
fn corner_offset(corner: u32) -> vec3<f32> {
    return vec3<f32>(
        select(-0.5, 0.5, (corner & 4u) != 0u),
        select(-0.5, 0.5, (corner & 2u) != 0u),
        select(-0.5, 0.5, (corner & 1u) != 0u),
    );
}

// faces: -x, -y, -z, +x, +y, +z
fn face_normal(face: u32) -> vec3<f32> {
    let axis = face % 3u;
    let sign = select(-1.0, 1.0, face >= 3u);
    return vec3<f32>(
        select(0.0, sign, axis == 0u),
        select(0.0, sign, axis == 1u),
        select(0.0, sign, axis == 2u),
    );
}

fn quad_uv(quad: u32) -> vec2<f32> {
    return vec2<f32>(f32(quad & 1u), f32(quad >> 1u));
}

@vertex
fn vs_voxel(in: VoxelInput) -> VoxelOutput {
    let corner = in.code & 7u;
    let face = (in.code >> 3u) & 7u;
    let quad = (in.code >> 6u) & 3u;

    let world_pos = object.world * vec4<f32>(in.center + corner_offset(corner), 1.0);
    var out: VoxelOutput;
    out.clip_position = frame.view_proj * world_pos;
    out.world_pos = world_pos.xyz;
    out.normal = normalize((object.world * vec4<f32>(face_normal(face), 0.0)).xyz);
    out.uv = quad_uv(quad);
    return out;
}

@fragment
fn fs_voxel(in: VoxelOutput) -> @location(0) vec4<f32> {
    let edge = min(min(in.uv.x, 1.0 - in.uv.x), min(in.uv.y, 1.0 - in.uv.y));
    let albedo = vec3<f32>(select(1.0, 0.7, edge < 0.04));
    let color = shade(
        in.world_pos,
        normalize(in.normal),
        albedo,
        object.ambient,
        object.diffuse,
        object.specular,
        object.specular_power,
    );
    return vec4<f32>(color, 1.0);
}
"#
);

/// Instanced unit cubes for scene entities.
pub const CUBE_SHADER: &str = concat!(
    frame_wgsl!(),
    r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct InstanceInput {
    @location(2) model_0: vec4<f32>,
    @location(3) model_1: vec4<f32>,
    @location(4) model_2: vec4<f32>,
    @location(5) model_3: vec4<f32>,
    @location(6) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) color: vec4<f32>,
};

@vertex
fn vs_cube(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    let world_pos = model * vec4<f32>(vertex.position, 1.0);

    var out: VertexOutput;
    out.clip_position = frame.view_proj * world_pos;
    out.world_pos = world_pos.xyz;
    out.world_normal = normalize((model * vec4<f32>(vertex.normal, 0.0)).xyz);
    out.color = instance.color;
    return out;
}

@fragment
fn fs_cube(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = shade(
        in.world_pos,
        normalize(in.world_normal),
        in.color.rgb,
        vec4<f32>(1.0, 1.0, 1.0, 0.25),
        vec4<f32>(1.0, 1.0, 1.0, 0.75),
        vec4<f32>(1.0, 1.0, 1.0, 0.3),
        16.0,
    );
    return vec4<f32>(color, 1.0);
}
"#
);

/// Full-screen sky composite over the main pass colour and depth.
pub const SKY_SHADER: &str = r#"
struct Sky {
    inv_view_proj: mat4x4<f32>,
    heaven: vec4<f32>,
    hell: vec4<f32>,
    sun: vec4<f32>,
    z_near: f32,
    z_far: f32,
    depth_valid: f32,
    _pad: f32,
};

@group(0) @binding(0)
var<uniform> sky: Sky;
@group(0) @binding(1)
var scene_color: texture_2d<f32>;
@group(0) @binding(2)
var scene_depth: texture_depth_2d;
@group(0) @binding(3)
var linear_sampler: sampler;

struct SkyOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
    @location(1) uv: vec2<f32>,
};

@vertex
fn vs_sky(@builtin(vertex_index) index: u32) -> SkyOutput {
    let x = f32((index << 1u) & 2u);
    let y = f32(index & 2u);
    var out: SkyOutput;
    out.ndc = vec2<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0);
    out.clip_position = vec4<f32>(out.ndc, 0.0, 1.0);
    out.uv = vec2<f32>(x, 1.0 - y);
    return out;
}

@fragment
fn fs_sky(in: SkyOutput) -> @location(0) vec4<f32> {
    let scene = textureSample(scene_color, linear_sampler, in.uv);
    let coord = select(vec2<i32>(0, 0), vec2<i32>(in.clip_position.xy), sky.depth_valid > 0.5);
    let depth = textureLoad(scene_depth, coord, 0);

    let near = sky.inv_view_proj * vec4<f32>(in.ndc, 0.0, 1.0);
    let far = sky.inv_view_proj * vec4<f32>(in.ndc, 1.0, 1.0);
    let dir = normalize(far.xyz / far.w - near.xyz / near.w);

    let t = smoothstep(0.0, 1.0, dir.y * 0.5 + 0.5);
    var color = mix(sky.hell.rgb, sky.heaven.rgb, t);
    if (sky.sun.w > 0.0) {
        let s = max(dot(dir, normalize(sky.sun.xyz)), 0.0);
        color = color + vec3<f32>(1.0, 0.9, 0.7) * pow(s, 256.0);
    }

    // Geometry writes alpha 1; the main pass clears to alpha 0.
    if (scene.a < 0.5) {
        return vec4<f32>(color, 1.0);
    }
    let linear_depth = sky.z_near * sky.z_far / (sky.z_far - depth * (sky.z_far - sky.z_near));
    let fog = select(0.0, smoothstep(sky.z_far * 0.6, sky.z_far, linear_depth), sky.depth_valid > 0.5);
    return vec4<f32>(mix(scene.rgb, color, fog), 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_frame_block_is_included() {
        for source in [VOXEL_SHADER, CUBE_SHADER] {
            assert!(source.contains("struct Frame"));
            assert!(source.contains("fn shade("));
        }
        assert!(!SKY_SHADER.contains("struct Frame"));
    }

    #[test]
    fn entry_points_exist() {
        assert!(VOXEL_SHADER.contains("fn vs_voxel") && VOXEL_SHADER.contains("fn fs_voxel"));
        assert!(CUBE_SHADER.contains("fn vs_cube") && CUBE_SHADER.contains("fn fs_cube"));
        assert!(SKY_SHADER.contains("fn vs_sky") && SKY_SHADER.contains("fn fs_sky"));
    }
}
