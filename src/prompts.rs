//! Rendering prompt sent to the image-generation provider.
//!
//! The prompt is fixed per process: every render uses the same instructions
//! and only the conditioning image changes. Callers can override it via
//! [`crate::config::RenderConfig::prompt`].

/// Default prompt: turn a 2D floor plan into a furnished top-down 3D render.
pub const DEFAULT_RENDER_PROMPT: &str = r#"You are an architectural visualisation artist. The attached image is a 2D floor plan.

Produce a single photorealistic 3D render of this floor plan seen from directly above (top-down orthographic view, roof removed).

Rules:
1. LAYOUT
   - Keep every wall, door, window and room exactly where the plan puts them
   - Preserve room proportions; do not add, remove or merge rooms
2. MATERIALS
   - Wood or tile flooring appropriate to each room type
   - White walls with visible thickness, realistic door and window frames
3. FURNISHING
   - Furnish each room according to its label or evident purpose
   - Keep furniture to scale and clear of doorways
4. STYLE
   - Soft, even daylight with subtle shadows
   - Clean modern interior, no people, no text, no labels, no dimension lines
5. OUTPUT
   - Return only the rendered image, square framing, plan centred"#;
