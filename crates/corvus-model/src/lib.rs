//! 模型加载边界
//!
//! 消费一个 OBJ 文件路径，产出 CPU 侧的 mesh/材质描述/纹理像素缓存。
//! GPU 上传由渲染器完成，这里不触碰任何图形 API。

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::Context;

/// 纹理的语义类型
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Height,
    AmbientOcclusion,
    Metallic,
    Roughness,
}

/// CPU 侧的顶点
#[derive(Copy, Clone, Debug)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// 一个 mesh：顶点 + 三角形索引 + material 下标
pub struct ModelMesh {
    pub name: String,
    pub material_index: u32,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
}

/// 材质描述：有序的 (纹理路径, 语义类型) 列表
#[derive(Default)]
pub struct ModelMaterial {
    pub name: String,
    pub textures: Vec<(String, TextureKind)>,
}

/// 解码完成的 RGBA8 像素
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// 一个外部加载的模型资产
///
/// 纹理缓存以解析后的文件路径为 key 去重；
/// 上传后 GPU 侧的 mesh buffer / image 保持同样的下标和 key（并行数组约定）
pub struct Model {
    pub meshes: Vec<ModelMesh>,
    pub materials: Vec<ModelMaterial>,
    pub textures: HashMap<String, TextureData>,
}

impl Model {
    /// 从 OBJ 文件加载模型；MTL 中引用的纹理被解码进缓存
    ///
    /// 单个纹理解码失败只会让该纹理缺席（记录日志），不会让整个模型加载失败
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        let (obj_models, obj_materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                single_index: true,
                triangulate: true,
                ignore_lines: true,
                ignore_points: true,
                ..Default::default()
            },
        )
        .with_context(|| format!("failed to load OBJ file: {:?}", path))?;

        let obj_materials = obj_materials.unwrap_or_else(|e| {
            log::warn!("failed to load MTL for {:?}: {}", path, e);
            Vec::new()
        });

        let mut textures = HashMap::new();
        let materials = obj_materials
            .iter()
            .map(|mat| {
                let mut material = ModelMaterial {
                    name: mat.name.clone(),
                    ..Default::default()
                };

                let texture_slots: [(&Option<String>, TextureKind); 5] = [
                    (&mat.diffuse_texture, TextureKind::Diffuse),
                    (&mat.specular_texture, TextureKind::Specular),
                    (&mat.normal_texture, TextureKind::Normal),
                    (&mat.ambient_texture, TextureKind::AmbientOcclusion),
                    (&mat.shininess_texture, TextureKind::Roughness),
                ];

                for (texture_path, kind) in texture_slots {
                    let Some(texture_path) = texture_path else { continue };
                    if let Some(resolved) = load_texture_cached(&base_dir, texture_path, &mut textures) {
                        material.textures.push((resolved, kind));
                    }
                }

                material
            })
            .collect();

        let meshes = obj_models
            .into_iter()
            .map(|m| {
                let mesh = m.mesh;
                let vertex_count = mesh.positions.len() / 3;

                let normals = if mesh.normals.is_empty() {
                    generate_normals(&mesh.positions, &mesh.indices)
                } else {
                    mesh.normals.clone()
                };

                let vertices = (0..vertex_count)
                    .map(|i| ModelVertex {
                        position: [
                            mesh.positions[i * 3],
                            mesh.positions[i * 3 + 1],
                            mesh.positions[i * 3 + 2],
                        ],
                        normal: [normals[i * 3], normals[i * 3 + 1], normals[i * 3 + 2]],
                        uv: if mesh.texcoords.is_empty() {
                            [0.0, 0.0]
                        } else {
                            [mesh.texcoords[i * 2], mesh.texcoords[i * 2 + 1]]
                        },
                    })
                    .collect();

                ModelMesh {
                    name: m.name,
                    material_index: mesh.material_id.unwrap_or(0) as u32,
                    vertices,
                    indices: mesh.indices,
                }
            })
            .collect();

        Ok(Self {
            meshes,
            materials,
            textures,
        })
    }
}

/// 解码纹理并放入缓存；同一路径只解码一次
///
/// 返回解析后的路径（缓存的 key）；解码失败返回 None
fn load_texture_cached(
    base_dir: &Path,
    texture_path: &str,
    cache: &mut HashMap<String, TextureData>,
) -> Option<String> {
    let resolved: PathBuf = base_dir.join(texture_path);
    let key = resolved.to_string_lossy().to_string();

    if cache.contains_key(&key) {
        return Some(key);
    }

    match image::open(&resolved) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            cache.insert(
                key.clone(),
                TextureData {
                    width: rgba.width(),
                    height: rgba.height(),
                    data: rgba.into_raw(),
                },
            );
            Some(key)
        }
        Err(e) => {
            log::error!("failed to decode texture {:?}: {}", resolved, e);
            None
        }
    }
}

/// 面法线累加的平滑法线，用于缺少法线的 OBJ
fn generate_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex_count = positions.len() / 3;
    let mut normals = vec![0.0f32; vertex_count * 3];

    let pos = |i: usize| [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]];

    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let (p0, p1, p2) = (pos(i0), pos(i1), pos(i2));

        let e1 = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
        let e2 = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];
        let n = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];

        for i in [i0, i1, i2] {
            normals[i * 3] += n[0];
            normals[i * 3 + 1] += n[1];
            normals[i * 3 + 2] += n[2];
        }
    }

    for n in normals.chunks_exact_mut(3) {
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len > 1e-8 {
            n[0] /= len;
            n[1] /= len;
            n[2] /= len;
        } else {
            n[2] = 1.0;
        }
    }

    normals
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
    }

    #[test]
    fn load_quad_obj() {
        let model = Model::load(fixture("quad.obj")).unwrap();

        assert_eq!(model.meshes.len(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
        // 三角形化后的索引仍然指向原始顶点
        assert!(mesh.indices.iter().all(|i| (*i as usize) < mesh.vertices.len()));

        // MTL 解析出一个 material，纹理文件不存在所以缓存为空
        assert_eq!(model.materials.len(), 1);
        assert!(model.textures.is_empty());
    }

    #[test]
    fn quad_normals_point_up() {
        let model = Model::load(fixture("quad.obj")).unwrap();
        let mesh = &model.meshes[0];

        // fixture 没有显式法线，生成的面法线应当指向 +Y
        for v in &mesh.vertices {
            assert!((v.normal[1] - 1.0).abs() < 1e-5, "normal = {:?}", v.normal);
        }
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Model::load("does/not/exist.obj").is_err());
    }
}
