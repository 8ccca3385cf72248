//! Test fixtures: a scripted stand-in for the extractor binary.
//!
//! The fake extractor speaks just enough of the real CLI for the service:
//! it answers `--version`, emits NDJSON for `-j` probes, and for downloads
//! prints the stdout grammar the driver parses before dropping a quarantine
//! artifact. Which scenario it plays is encoded in the video id of the
//! request URL, so each test picks its behavior through the public API.

use std::path::{Path, PathBuf};

/// A platform watch URL whose video id selects a fake-extractor scenario.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

const FAKE_EXTRACTOR: &str = r#"#!/usr/bin/env bash
# Scripted extractor double for end-to-end tests.
set -u

OUT=""
URL=""
PROBE=0
prev=""
for a in "$@"; do
  if [ "$prev" = "-o" ]; then OUT="$a"; fi
  case "$a" in
    --version) echo "2025.01.15"; exit 0 ;;
    --skip-download) PROBE=1 ;;
    -j) PROBE=1 ;;
    http*) URL="$a" ;;
  esac
  prev="$a"
done

if [ "$PROBE" = "1" ]; then
  case "$URL" in
    *list=*)
      echo '{"id":"p1","title":"Entry One","filesize":1048576}'
      echo '{"id":"p2","title":"Entry Two","filesize_approx":2097152}'
      ;;
    *v=badjson*)
      echo 'this is not json'
      ;;
    *)
      echo '{"id":"x","title":"Fake Video","channel":"Fake Channel","duration":63,"upload_date":"20240101","filesize":5242880}'
      ;;
  esac
  exit 0
fi

DIR=$(dirname "$OUT")
BASE=$(basename "$OUT")
STEM=$(printf '%s' "$BASE" | sed 's/\.%(ext)s$//')

case "$URL" in
  *v=audiosmall*)
    echo "[download] Destination: $DIR/$STEM.opus"
    echo "[download] 100% of 5.00MiB"
    echo "[ExtractAudio] Destination: $DIR/$STEM.mp3"
    sleep 0.4
    head -c 4096 /dev/zero > "$DIR/$STEM.mp3"
    exit 0
    ;;
  *v=mergedvid*)
    echo "[download] Destination: $DIR/$STEM.f137.mp4"
    echo "[download]  50.0% of 10.00MiB"
    echo "[download] 100% of 10.00MiB"
    echo "[download] Destination: $DIR/$STEM.f140.m4a"
    echo "[download] 100% of 1.00MiB"
    echo "[Merger] Merging formats into \"$DIR/$STEM.mp4\""
    sleep 0.4
    head -c 8192 /dev/zero > "$DIR/$STEM.mp4"
    echo "Deleting original file $DIR/$STEM.f137.mp4 (pass -k to keep)"
    exit 0
    ;;
  *v=slowsteady*)
    echo "[download] Destination: $DIR/$STEM.mp4"
    touch "$DIR/$STEM.mp4.part"
    for i in $(seq 1 80); do
      echo "[download]  ${i}.0% of 10.00MiB"
      sleep 0.05
    done
    rm -f "$DIR/$STEM.mp4.part"
    head -c 4096 /dev/zero > "$DIR/$STEM.mp4"
    exit 0
    ;;
  *v=brokenexit*)
    echo "[download] Destination: $DIR/$STEM.mp4"
    echo "[download]  10.0% of 10.00MiB"
    exit 3
    ;;
  *v=noartifact*)
    echo "[download] Destination: $DIR/$STEM.mp4"
    echo "[download] 100% of 1.00MiB"
    exit 0
    ;;
  *)
    echo "[download] Destination: $DIR/$STEM.mp4"
    echo "[download] 100% of 2.00MiB"
    head -c 2048 /dev/zero > "$DIR/$STEM.mp4"
    exit 0
    ;;
esac
"#;

/// Write the fake extractor script into `dir` and make it executable.
pub fn write_fake_extractor(dir: &Path) -> PathBuf {
    let path = dir.join("fake-extractor.sh");
    std::fs::write(&path, FAKE_EXTRACTOR).expect("Failed to write fake extractor");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to mark fake extractor executable");
    }

    path
}
