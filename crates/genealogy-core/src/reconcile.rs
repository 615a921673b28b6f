use crate::{Node, PreferredSource, Source};

/// Pick the authoritative tree out of the matrix and sponsor candidates.
///
/// The matrix result wins unless it is childless (or missing), the caller's
/// preference permits fallback, and a sponsor result was obtained. A matrix
/// result with children is labelled `Sponsor` when the caller asked for the
/// sponsor view, since the matrix endpoint rendered it in that variant.
///
/// Returns `None` only when there is nothing to show at all.
pub fn reconcile(
    matrix: Option<Node>,
    sponsor: Option<Node>,
    preferred: PreferredSource,
) -> Option<(Node, Source)> {
    if !preferred.permits_fallback() {
        return matrix.map(|node| (node, Source::Matrix));
    }

    match matrix {
        Some(node) if !node.is_leaf() => {
            let source = match preferred {
                PreferredSource::Sponsor => Source::Sponsor,
                _ => Source::Matrix,
            };
            Some((node, source))
        }
        Some(node) => match sponsor {
            Some(fallback) => Some((fallback, Source::Sponsor)),
            None => Some((node, Source::Matrix)),
        },
        None => sponsor.map(|fallback| (fallback, Source::Sponsor)),
    }
}
