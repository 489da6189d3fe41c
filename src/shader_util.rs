// Include WGSL shader source by specifying a path relative to the shader
// source directory.
#[macro_export]
macro_rules! include_shader {
    ($path:literal) => {
        include_str!(concat!("shaders/", $path))
    };
}
