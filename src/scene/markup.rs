/// Declarative AR scene for one issue category: a spinning marker box with a
/// `CATEGORY DETECTED` label on the hiro marker, plus a floating hint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneDescription {
    category: String,
}

impl SceneDescription {
    pub fn for_category(category: &str) -> Self {
        Self {
            category: category.to_string(),
        }
    }

    /// Text shown above the marker.
    pub fn headline(&self) -> String {
        format!("{} DETECTED", sanitize(&self.category).to_uppercase())
    }

    pub fn to_markup(&self) -> String {
        format!(
            r##"<a-scene vr-mode-ui="enabled: false" arjs="sourceType: webcam; debugUIEnabled: false; detectionMode: mono_and_matrix; matrixCodeType: 3x3;" renderer="logarithmicDepthBuffer: true;" embedded>
  <a-marker preset="hiro" raycaster="objects: .clickable" emitevents="true" cursor="fuse: false; rayOrigin: mouse">
    <a-box position="0 0.5 0" rotation="0 45 0" color="#ff6b6b" animation="property: rotation; to: 0 405 0; loop: true; dur: 3000"></a-box>
    <a-text position="0 1.5 0" text="value: {headline}; color: #ffffff; align: center" background="color: #ff4444; opacity: 0.8" geometry="primitive: plane; width: 3; height: 0.6"></a-text>
    <a-cylinder position="1 0.75 0" radius="0.3" height="1.5" color="#4ecdc4" animation="property: position; to: 1 1.25 0; dir: alternate; dur: 1000; loop: true"></a-cylinder>
  </a-marker>
  <a-text position="0 2 -3" text="value: Point camera at issue location; color: #00ff00; align: center" background="color: rgba(0,0,0,0.5)" visible="true"></a-text>
  <a-entity camera look-controls wasd-controls position="0 1.6 0"></a-entity>
</a-scene>"##,
            headline = self.headline()
        )
    }
}

/// Keep the category from breaking out of the attribute or component syntax.
fn sanitize(category: &str) -> String {
    category
        .chars()
        .filter(|c| !matches!(c, ';' | ':' | '"' | '\'' | '<' | '>' | '&'))
        .map(|c| if c == '_' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headline_uses_category() {
        let scene = SceneDescription::for_category("broken_streetlight");
        assert_eq!(scene.headline(), "BROKEN STREETLIGHT DETECTED");
        let markup = scene.to_markup();
        assert!(markup.starts_with("<a-scene"));
        assert!(markup.contains(r#"preset="hiro""#));
        assert!(markup.contains("value: BROKEN STREETLIGHT DETECTED;"));
    }

    #[test]
    fn hostile_category_cannot_escape_attribute() {
        let scene = SceneDescription::for_category(r#"pothole"; color: red; <script>"#);
        assert_eq!(scene.headline(), "POTHOLE COLOR RED SCRIPT DETECTED");
        assert!(!scene.to_markup().contains("<script>"));
    }
}
